use std::sync::Arc;

use core::ids::AnalysisId;
use dashmap::DashMap;
use parsers::worker::CancelFlag;

/// In-memory map from a running Analysis to its cooperative cancel flag.
/// A cancel request flips both this flag (observed by the worker loop
/// between output chunks) and the persisted `cancel_requested` column (so a
/// *different* coordinator process — after a restart — still honors it on
/// its next progress check).
#[derive(Clone, Default)]
pub struct CancelRegistry {
    flags: Arc<DashMap<AnalysisId, CancelFlag>>
}

impl CancelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, id: AnalysisId) -> CancelFlag {
        let flag = CancelFlag::new();
        self.flags.insert(id, flag.clone());
        flag
    }

    pub fn cancel(&self, id: AnalysisId) {
        if let Some(flag) = self.flags.get(&id) {
            flag.cancel();
        }
    }

    pub fn forget(&self, id: AnalysisId) {
        self.flags.remove(&id);
    }
}
