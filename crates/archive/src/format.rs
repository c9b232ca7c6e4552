use std::path::Path;

use errors::ArchiveError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    TarBzip2,
    TarGzip,
    Zip
}

const BZIP2_MAGIC: [u8; 3] = [0x42, 0x5a, 0x68]; // "BZh"
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const ZIP_MAGIC: [u8; 4] = [0x50, 0x4b, 0x03, 0x04]; // "PK\x03\x04"
const ZIP_EMPTY_MAGIC: [u8; 4] = [0x50, 0x4b, 0x05, 0x06]; // empty archive end-of-central-directory

/// Detect the archive format from magic bytes, falling back to the file
/// extension when the header is ambiguous or absent (§4.2).
pub fn detect(head: &[u8], path_hint: Option<&Path>) -> Result<ArchiveFormat, ArchiveError> {
    if head.len() >= 3 && head[..3] == BZIP2_MAGIC {
        return Ok(ArchiveFormat::TarBzip2);
    }
    if head.len() >= 2 && head[..2] == GZIP_MAGIC {
        return Ok(ArchiveFormat::TarGzip);
    }
    if head.len() >= 4 && (head[..4] == ZIP_MAGIC || head[..4] == ZIP_EMPTY_MAGIC) {
        return Ok(ArchiveFormat::Zip);
    }

    if let Some(path) = path_hint {
        let name = path.to_string_lossy().to_lowercase();
        if name.ends_with(".tar.bz2") || name.ends_with(".tbz2") || name.ends_with(".tbz") {
            return Ok(ArchiveFormat::TarBzip2);
        }
        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            return Ok(ArchiveFormat::TarGzip);
        }
        if name.ends_with(".zip") {
            return Ok(ArchiveFormat::Zip);
        }
    }

    Err(ArchiveError::Unsupported)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_bzip2_by_magic() {
        let head = [0x42, 0x5a, 0x68, 0x39, 0x31];
        assert_eq!(detect(&head, None).unwrap(), ArchiveFormat::TarBzip2);
    }

    #[test]
    fn detects_gzip_by_magic() {
        let head = [0x1f, 0x8b, 0x08, 0x00];
        assert_eq!(detect(&head, None).unwrap(), ArchiveFormat::TarGzip);
    }

    #[test]
    fn detects_zip_by_magic() {
        let head = [0x50, 0x4b, 0x03, 0x04];
        assert_eq!(detect(&head, None).unwrap(), ArchiveFormat::Zip);
    }

    #[test]
    fn falls_back_to_extension() {
        let head = [0u8; 4];
        let path = Path::new("archive.tar.gz");
        assert_eq!(detect(&head, Some(path)).unwrap(), ArchiveFormat::TarGzip);
    }

    #[test]
    fn unknown_magic_and_extension_is_unsupported() {
        let head = [0u8; 4];
        let path = Path::new("archive.dat");
        assert!(matches!(detect(&head, Some(path)), Err(ArchiveError::Unsupported)));
    }
}
