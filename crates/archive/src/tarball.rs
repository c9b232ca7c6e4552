use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::Path;

use chrono::{TimeZone, Utc};
use errors::ArchiveError;

use crate::format::ArchiveFormat;
use crate::member::ArchiveMember;

fn open_decoder(path: &Path, format: ArchiveFormat) -> io::Result<Box<dyn Read>> {
    let file = BufReader::new(File::open(path)?);
    Ok(match format {
        ArchiveFormat::TarBzip2 => Box::new(bzip2::read::BzDecoder::new(file)),
        ArchiveFormat::TarGzip => Box::new(flate2::read::GzDecoder::new(file)),
        ArchiveFormat::Zip => unreachable!("zip is handled by ziparchive module")
    })
}

/// Either compression the tar body stream can be written through, finished
/// explicitly so a flush failure surfaces as an error instead of being
/// swallowed on drop.
enum TarEncoder {
    Bzip2(bzip2::write::BzEncoder<File>),
    Gzip(flate2::write::GzEncoder<File>)
}

impl TarEncoder {
    fn new(format: ArchiveFormat, file: File) -> Self {
        match format {
            ArchiveFormat::TarBzip2 => TarEncoder::Bzip2(bzip2::write::BzEncoder::new(file, bzip2::Compression::default())),
            ArchiveFormat::TarGzip => TarEncoder::Gzip(flate2::write::GzEncoder::new(file, flate2::Compression::default())),
            ArchiveFormat::Zip => unreachable!("zip is handled by ziparchive module")
        }
    }

    fn finish(self) -> io::Result<()> {
        match self {
            TarEncoder::Bzip2(e) => e.finish().map(|_| ()),
            TarEncoder::Gzip(e) => e.finish().map(|_| ())
        }
    }
}

impl Write for TarEncoder {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            TarEncoder::Bzip2(e) => e.write(buf),
            TarEncoder::Gzip(e) => e.write(buf)
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            TarEncoder::Bzip2(e) => e.flush(),
            TarEncoder::Gzip(e) => e.flush()
        }
    }
}

pub fn list_members(path: &Path, format: ArchiveFormat) -> Result<Vec<ArchiveMember>, ArchiveError> {
    let decoder = open_decoder(path, format).map_err(|e| ArchiveError::Io { reason: e.to_string() })?;
    let mut archive = tar::Archive::new(decoder);
    let mut members = Vec::new();

    let entries = archive.entries().map_err(|e| ArchiveError::Corrupt { reason: e.to_string() })?;
    for entry in entries {
        let mut entry = entry.map_err(|e| ArchiveError::Corrupt { reason: e.to_string() })?;
        let name = entry
            .path()
            .map_err(|e| ArchiveError::Corrupt { reason: e.to_string() })?
            .to_string_lossy()
            .into_owned();
        let mtime_secs = entry.header().mtime().map_err(|e| ArchiveError::Corrupt { reason: e.to_string() })?;
        let mtime = Utc.timestamp_opt(mtime_secs as i64, 0).single().unwrap_or_else(Utc::now);

        // Drain the body without materializing it, so filtering never pays
        // for decompressing the full archive into memory.
        io::copy(&mut entry, &mut io::sink()).map_err(|e| ArchiveError::Corrupt { reason: e.to_string() })?;

        members.push(ArchiveMember { name, mtime });
    }

    Ok(members)
}

/// Re-encode only the retained members into a new archive of the same
/// format at `dest`, preserving names and mtimes (§4.2).
pub fn write_filtered(
    src: &Path,
    dest: &Path,
    format: ArchiveFormat,
    keep: &std::collections::HashSet<String>
) -> Result<(), ArchiveError> {
    let decoder = open_decoder(src, format).map_err(|e| ArchiveError::Io { reason: e.to_string() })?;
    let mut archive = tar::Archive::new(decoder);

    let out_file = File::create(dest).map_err(|e| ArchiveError::Io { reason: e.to_string() })?;
    let encoder = TarEncoder::new(format, out_file);
    let mut builder = tar::Builder::new(encoder);

    let entries = archive.entries().map_err(|e| ArchiveError::Corrupt { reason: e.to_string() })?;
    for entry in entries {
        let mut entry = entry.map_err(|e| ArchiveError::Corrupt { reason: e.to_string() })?;
        let name = entry
            .path()
            .map_err(|e| ArchiveError::Corrupt { reason: e.to_string() })?
            .to_string_lossy()
            .into_owned();
        if !keep.contains(&name) {
            io::copy(&mut entry, &mut io::sink())
                .map_err(|e| ArchiveError::Corrupt { reason: e.to_string() })?;
            continue;
        }
        let header = entry.header().clone();
        builder
            .append(&header, &mut entry)
            .map_err(|e| ArchiveError::Io { reason: e.to_string() })?;
    }

    let encoder = builder.into_inner().map_err(|e| ArchiveError::Io { reason: e.to_string() })?;
    encoder.finish().map_err(|e| ArchiveError::Io { reason: e.to_string() })
}
