//! Archive inspector (C2): format detection, member stats, and time-window
//! pre-filtering before a parser ever sees the bytes.
//!
//! All archive IO in this crate is synchronous (the `tar`/`zip`/`bzip2`/
//! `flate2` crates are blocking); callers run it via `tokio::task::spawn_blocking`
//! so it never stalls the async runtime, the same pattern the teacher
//! codebase uses for `git2` operations in `context`/`knowledge`.

pub mod format;
pub mod member;
mod tarball;
mod ziparchive;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use errors::ArchiveError;

pub use format::ArchiveFormat;
pub use member::{ArchiveMember, ArchiveStat};

/// Default symmetric buffer applied to the requested window (§4.2).
pub const DEFAULT_BUFFER: Duration = Duration::hours(1);

/// If the filter would retain more than this fraction of members, returning
/// the original archive costs less than the filtering overhead (§4.2).
const RETENTION_SKIP_THRESHOLD: f64 = 0.8;

fn read_head(path: &Path) -> Result<Vec<u8>, ArchiveError> {
    use std::io::Read;
    let mut file = std::fs::File::open(path).map_err(|e| ArchiveError::Io { reason: e.to_string() })?;
    let mut head = vec![0u8; 8];
    let n = file.read(&mut head).map_err(|e| ArchiveError::Io { reason: e.to_string() })?;
    head.truncate(n);
    Ok(head)
}

fn list_members(path: &Path, format: ArchiveFormat) -> Result<Vec<ArchiveMember>, ArchiveError> {
    match format {
        ArchiveFormat::TarBzip2 | ArchiveFormat::TarGzip => tarball::list_members(path, format),
        ArchiveFormat::Zip => ziparchive::list_members(path)
    }
}

/// Detect the format and enumerate member count / mtime range (§4.2).
///
/// Fails with `ArchiveError::Unsupported` on unknown magic/extension, or
/// `ArchiveError::Corrupt` on a truncated stream — both are meant to be
/// non-fatal to the caller, which falls back to treating the archive
/// unfiltered.
pub fn stat(path: &Path) -> Result<ArchiveStat, ArchiveError> {
    let head = read_head(path)?;
    let format = format::detect(&head, Some(path))?;
    let members = list_members(path, format)?;
    Ok(ArchiveStat::from_members(&members))
}

/// Produce a sub-archive retaining only members whose mtime falls in
/// `[window_start - buffer, window_end + buffer]` (inclusive both ends),
/// written to a new file under `dest_dir`. Returns the original `path`
/// unchanged when filtering would be empty or would retain more than
/// `RETENTION_SKIP_THRESHOLD` of the members (§4.2, §8 property 4).
///
/// `window_start`/`window_end` must already be normalized to UTC by the
/// caller — naive timestamps are assumed UTC at the ingestion boundary
/// (`jobs` crate), never here (§9 "no naive timestamps in the domain
/// model").
pub fn filter_by_time(
    path: &Path,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    buffer: Duration,
    dest_dir: &Path
) -> Result<PathBuf, ArchiveError> {
    let head = read_head(path)?;
    let format = format::detect(&head, Some(path))?;
    let members = list_members(path, format)?;

    if members.is_empty() {
        return Ok(path.to_path_buf());
    }

    let lo = window_start - buffer;
    let hi = window_end + buffer;
    let keep_names: std::collections::HashSet<String> = members
        .iter()
        .filter(|m| m.mtime >= lo && m.mtime <= hi)
        .map(|m| m.name.clone())
        .collect();

    if keep_names.is_empty() {
        tracing::debug!("time-window filter would be empty; returning original archive");
        return Ok(path.to_path_buf());
    }

    let retained_fraction = keep_names.len() as f64 / members.len() as f64;
    if retained_fraction > RETENTION_SKIP_THRESHOLD {
        tracing::debug!(
            retained_fraction,
            "filter would retain most of the archive; skipping to avoid overhead"
        );
        return Ok(path.to_path_buf());
    }

    std::fs::create_dir_all(dest_dir).map_err(|e| ArchiveError::Io { reason: e.to_string() })?;
    let extension = match format {
        ArchiveFormat::TarBzip2 => "tar.bz2",
        ArchiveFormat::TarGzip => "tar.gz",
        ArchiveFormat::Zip => "zip"
    };
    let dest = dest_dir.join(format!("{}.filtered.{extension}", uuid_like_name()));

    match format {
        ArchiveFormat::TarBzip2 | ArchiveFormat::TarGzip => {
            tarball::write_filtered(path, &dest, format, &keep_names)?;
        }
        ArchiveFormat::Zip => ziparchive::write_filtered(path, &dest, &keep_names)?
    }

    Ok(dest)
}

fn uuid_like_name() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_nanos()).unwrap_or(0);
    format!("{nanos:x}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn write_tar_gz(path: &Path, members: &[(&str, i64, &[u8])]) {
        let file = std::fs::File::create(path).unwrap();
        let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (name, mtime, data) in members {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mtime(*mtime as u64);
            header.set_cksum();
            builder.append_data(&mut header, name, *data).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
    }

    #[test]
    fn stat_reports_member_count_and_mtime_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.tar.gz");
        write_tar_gz(
            &path,
            &[
                ("a.log", 1_000, b"a"),
                ("b.log", 2_000, b"b"),
                ("c.log", 3_000, b"c"),
            ]
        );
        let stat = stat(&path).unwrap();
        assert_eq!(stat.member_count, 3);
        assert_eq!(stat.earliest_mtime.unwrap().timestamp(), 1_000);
        assert_eq!(stat.latest_mtime.unwrap().timestamp(), 3_000);
    }

    #[test]
    fn filter_retains_only_members_in_window() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.tar.gz");
        // Five widely spaced members so a 1-match filter stays under the
        // 80% skip-threshold.
        write_tar_gz(
            &path,
            &[
                ("sep01.log", 1_693_526_400, b"1"),
                ("sep15.log", 1_694_736_000, b"2"),
                ("oct01.log", 1_696_118_400, b"3"),
                ("nov01.log", 1_698_796_800, b"4"),
                ("dec01.log", 1_701_388_800, b"5"),
            ]
        );
        let window_start = Utc.timestamp_opt(1_694_649_600, 0).unwrap(); // 2023-09-14
        let window_end = Utc.timestamp_opt(1_694_822_400, 0).unwrap(); // 2023-09-16
        let dest_dir = dir.path().join("out");
        let filtered =
            filter_by_time(&path, window_start, window_end, DEFAULT_BUFFER, &dest_dir).unwrap();
        assert_ne!(filtered, path);

        let members = stat(&filtered).unwrap();
        assert_eq!(members.member_count, 1);
    }

    #[test]
    fn empty_filter_result_returns_original_archive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.tar.gz");
        write_tar_gz(&path, &[("only.log", 1_000, b"x")]);
        let far_future = Utc.timestamp_opt(9_999_999_999, 0).unwrap();
        let dest_dir = dir.path().join("out");
        let filtered =
            filter_by_time(&path, far_future, far_future, Duration::seconds(1), &dest_dir).unwrap();
        assert_eq!(filtered, path, "must return the original archive, byte-identical, when empty");
    }
}
