use std::fs::File;
use std::path::Path;

use chrono::{TimeZone, Utc};
use errors::ArchiveError;
use zip::DateTime as ZipDateTime;

use crate::member::ArchiveMember;

fn to_chrono(dt: ZipDateTime) -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(
        i32::from(dt.year()),
        u32::from(dt.month()),
        u32::from(dt.day()),
        u32::from(dt.hour()),
        u32::from(dt.minute()),
        u32::from(dt.second())
    )
    .single()
    .unwrap_or_else(Utc::now)
}

/// Reads the central directory only — `zip::ZipArchive::new` parses the
/// end-of-central-directory record and per-entry headers without
/// decompressing any entry body (§4.2).
pub fn list_members(path: &Path) -> Result<Vec<ArchiveMember>, ArchiveError> {
    let file = File::open(path).map_err(|e| ArchiveError::Io { reason: e.to_string() })?;
    let mut zip = zip::ZipArchive::new(file).map_err(|e| ArchiveError::Corrupt { reason: e.to_string() })?;

    let mut members = Vec::with_capacity(zip.len());
    for i in 0..zip.len() {
        let entry = zip.by_index(i).map_err(|e| ArchiveError::Corrupt { reason: e.to_string() })?;
        if entry.is_dir() {
            continue;
        }
        members.push(ArchiveMember {
            name: entry.name().to_string(),
            mtime: to_chrono(entry.last_modified().unwrap_or_default())
        });
    }
    Ok(members)
}

/// Copies retained entries into a new zip using raw (compress-once) copies,
/// so filtering never pays to decompress-then-recompress member bodies.
pub fn write_filtered(
    src: &Path,
    dest: &Path,
    keep: &std::collections::HashSet<String>
) -> Result<(), ArchiveError> {
    let src_file = File::open(src).map_err(|e| ArchiveError::Io { reason: e.to_string() })?;
    let mut zip = zip::ZipArchive::new(src_file).map_err(|e| ArchiveError::Corrupt { reason: e.to_string() })?;

    let dest_file = File::create(dest).map_err(|e| ArchiveError::Io { reason: e.to_string() })?;
    let mut writer = zip::ZipWriter::new(dest_file);

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i).map_err(|e| ArchiveError::Corrupt { reason: e.to_string() })?;
        if entry.is_dir() || !keep.contains(entry.name()) {
            continue;
        }
        writer
            .raw_copy_file(&mut entry)
            .map_err(|e| ArchiveError::Io { reason: e.to_string() })?;
    }

    writer.finish().map_err(|e| ArchiveError::Io { reason: e.to_string() })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_zero_date_converts_without_panicking() {
        let dt = ZipDateTime::default();
        let converted = to_chrono(dt);
        assert!(converted.timestamp() >= 0);
    }
}
