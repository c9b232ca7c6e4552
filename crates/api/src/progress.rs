//! Short-TTL download-progress tracker for `file_url` ingestion (§4.9).
//!
//! In-process only, one entry per principal, the same `DashMap`-backed
//! in-memory bookkeeping `jobs::CancelRegistry` uses for cancel flags —
//! fine for the single-process deployment this workspace targets, and
//! avoids round-tripping every progress tick through the KV backing store.

use std::sync::Arc;
use std::time::{Duration, Instant};

use core::ids::PrincipalId;
use dashmap::DashMap;
use serde::Serialize;

/// Entries older than this are treated as stale and reported as "not
/// downloading" even if never explicitly cleared (crash recovery).
const ENTRY_TTL: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, Serialize)]
pub struct DownloadProgress {
    pub downloading: bool,
    pub downloaded: u64,
    pub total: Option<u64>,
    pub pct: Option<u8>
}

struct Entry {
    progress: DownloadProgress,
    updated_at: Instant
}

#[derive(Default)]
pub struct ProgressTracker {
    entries: DashMap<PrincipalId, Entry>
}

impl ProgressTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&self, principal_id: PrincipalId, total: Option<u64>) {
        self.entries.insert(
            principal_id,
            Entry { progress: DownloadProgress { downloading: true, downloaded: 0, total, pct: total.map(|_| 0) }, updated_at: Instant::now() }
        );
    }

    pub fn update(&self, principal_id: PrincipalId, downloaded: u64) {
        if let Some(mut entry) = self.entries.get_mut(&principal_id) {
            entry.progress.downloaded = downloaded;
            entry.progress.pct = entry.progress.total.map(|total| {
                if total == 0 { 100 } else { ((downloaded.min(total) * 100) / total) as u8 }
            });
            entry.updated_at = Instant::now();
        }
    }

    pub fn finish(&self, principal_id: PrincipalId) {
        self.entries.remove(&principal_id);
    }

    #[must_use]
    pub fn get(&self, principal_id: PrincipalId) -> DownloadProgress {
        match self.entries.get(&principal_id) {
            Some(entry) if entry.updated_at.elapsed() < ENTRY_TTL => entry.progress.clone(),
            _ => DownloadProgress { downloading: false, downloaded: 0, total: None, pct: None }
        }
    }
}

pub type SharedProgress = Arc<ProgressTracker>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_entry_reports_not_downloading() {
        let tracker = ProgressTracker::new();
        let progress = tracker.get(PrincipalId::new());
        assert!(!progress.downloading);
    }

    #[test]
    fn pct_is_computed_from_total() {
        let tracker = ProgressTracker::new();
        let id = PrincipalId::new();
        tracker.start(id, Some(200));
        tracker.update(id, 50);
        let progress = tracker.get(id);
        assert_eq!(progress.pct, Some(25));
    }

    #[test]
    fn finish_clears_the_entry() {
        let tracker = ProgressTracker::new();
        let id = PrincipalId::new();
        tracker.start(id, Some(10));
        tracker.finish(id);
        assert!(!tracker.get(id).downloading);
    }
}
