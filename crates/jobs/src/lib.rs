//! Job coordinator (C4): owns the Analysis lifecycle end to end — claiming
//! work, materializing the source archive, fanning out to the parser worker
//! pool per mode, and finalizing per the partial-success policy (§4.4).

pub mod cancel_registry;
pub mod submit;

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use core::analysis::{Analysis, AnalysisErrorKind, AnalysisResult, AnalysisStatus};
use core::ids::AnalysisId;
use core::traits::ObjectStore;
use errors::CoreError;
use parsers::WorkerPool;
use storage::Repositories;
use tokio::io::AsyncWriteExt;

pub use cancel_registry::CancelRegistry;
pub use submit::{check_preconditions, submit, SubmissionRequest};

/// Ties the storage, object-store, archive-filtering, and parser-pool
/// layers together to carry one Analysis from `pending` to a terminal
/// state (§4.4).
pub struct JobCoordinator {
    repos: Repositories,
    object_store: Arc<dyn ObjectStore>,
    worker_pool: Arc<WorkerPool>,
    cancel_registry: CancelRegistry,
    scratch_dir: PathBuf
}

impl JobCoordinator {
    pub fn new(
        repos: Repositories,
        object_store: Arc<dyn ObjectStore>,
        worker_pool: Arc<WorkerPool>,
        scratch_dir: PathBuf
    ) -> Self {
        Self { repos, object_store, worker_pool, cancel_registry: CancelRegistry::new(), scratch_dir }
    }

    pub fn cancel_registry(&self) -> &CancelRegistry {
        &self.cancel_registry
    }

    /// Requests cancellation of a running or pending Analysis. Persists the
    /// request so a coordinator restart still honors it (§4.4), and flips
    /// the in-process flag so an actively-running worker observes it
    /// immediately.
    pub async fn cancel(&self, analysis_id: AnalysisId) -> Result<(), CoreError> {
        self.repos.analyses.request_cancel(analysis_id).await.map_err(CoreError::from)?;
        self.cancel_registry.cancel(analysis_id);
        Ok(())
    }

    /// Claims and runs one Analysis to completion. Intended to be called by
    /// a polling worker loop (or directly after `submit` for synchronous
    /// small deployments); safe to call concurrently for distinct
    /// `analysis_id`s from multiple coordinator processes, since claiming
    /// is a compare-and-set against the stored `pending` status.
    pub async fn run(&self, analysis_id: AnalysisId) -> Result<Analysis, CoreError> {
        let claimed =
            self.repos.analyses.try_transition(analysis_id, AnalysisStatus::Pending, AnalysisStatus::Running).await?;
        if !claimed {
            return Err(CoreError::conflict("analysis is not pending or was claimed by another worker"));
        }
        self.repos.analyses.mark_started(analysis_id, Utc::now()).await?;
        tracing::info!(%analysis_id, "analysis claimed, running");

        let analysis = self.repos.analyses.get(analysis_id).await?.ok_or_else(|| CoreError::not_found("analysis"))?;
        let cancel_flag = self.cancel_registry.register(analysis_id);

        let outcome = self.execute(&analysis, cancel_flag).await;
        self.cancel_registry.forget(analysis_id);

        let (final_status, error_kind, error_message) = match &outcome {
            Ok(()) => (AnalysisStatus::Completed, None, None),
            Err(RunFailure::Cancelled) => (AnalysisStatus::Cancelled, None, None),
            Err(RunFailure::Partial(message)) => (AnalysisStatus::Failed, Some(AnalysisErrorKind::Partial), Some(message.clone())),
            Err(RunFailure::Single(kind, message)) => (AnalysisStatus::Failed, Some(*kind), Some(message.clone()))
        };
        tracing::info!(%analysis_id, status = ?final_status, "analysis finished");

        let started_at = analysis.started_at.unwrap_or_else(Utc::now);
        let finished_at = Utc::now();
        let duration_ms = (finished_at - started_at).num_milliseconds().max(0);

        self.repos
            .analyses
            .finish(analysis_id, AnalysisStatus::Running, final_status, finished_at, duration_ms, error_kind, error_message.as_deref())
            .await?;

        self.repos.analyses.get(analysis_id).await?.ok_or_else(|| CoreError::not_found("analysis"))
    }

    async fn execute(&self, analysis: &Analysis, cancel_flag: parsers::worker::CancelFlag) -> Result<(), RunFailure> {
        let log_file = self
            .repos
            .log_files
            .get(analysis.log_file_id)
            .await
            .map_err(|e| RunFailure::Single(AnalysisErrorKind::ParserFailure, e.to_string()))?
            .ok_or_else(|| RunFailure::Single(AnalysisErrorKind::ParserFailure, "source log file is missing".to_string()))?;

        let stored_path = log_file
            .stored_path
            .as_deref()
            .ok_or_else(|| RunFailure::Single(AnalysisErrorKind::ParserFailure, "source log file has been hard-deleted".to_string()))?;

        let local_path = self
            .materialize(stored_path)
            .await
            .map_err(|e| RunFailure::Single(AnalysisErrorKind::ParserFailure, e.to_string()))?;

        let window = match (analysis.window_start, analysis.window_end) {
            (Some(start), Some(end)) => {
                let dest_dir = self.scratch_dir.clone();
                let candidate_path = local_path.clone();
                let filtered = tokio::task::spawn_blocking(move || {
                    archive::filter_by_time(&candidate_path, start, end, archive::DEFAULT_BUFFER, &dest_dir)
                })
                .await
                .map_err(|e| RunFailure::Single(AnalysisErrorKind::ParserFailure, e.to_string()))?
                .map_err(|e| RunFailure::Single(AnalysisErrorKind::ParserFailure, e.to_string()))?;
                Some((filtered, start.to_rfc3339(), end.to_rfc3339()))
            }
            _ => None
        };

        let (run_path, time_window) = match &window {
            Some((path, start, end)) => (path.clone(), Some((start.as_str(), end.as_str()))),
            None => (local_path.clone(), None)
        };
        let run_path_str = run_path.to_string_lossy().to_string();

        let mut join_set = tokio::task::JoinSet::new();
        for mode_key in &analysis.mode_keys {
            let pool = Arc::clone(&self.worker_pool);
            let mode_key = mode_key.clone();
            let archive_path = run_path_str.clone();
            let timezone = analysis.timezone.clone();
            let window_owned = time_window.map(|(s, e)| (s.to_string(), e.to_string()));
            let flag = cancel_flag.clone();
            join_set.spawn(async move {
                let window_ref = window_owned.as_ref().map(|(s, e)| (s.as_str(), e.as_str()));
                let result = pool.run(&mode_key, &archive_path, &timezone, window_ref, flag, None).await;
                (mode_key, result)
            });
        }

        let mut results = Vec::new();
        let mut failures = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            let (mode_key, result) = joined.map_err(|e| RunFailure::Single(AnalysisErrorKind::ParserFailure, e.to_string()))?;
            if cancel_flag.is_cancelled() {
                return Err(RunFailure::Cancelled);
            }
            match result {
                Ok((normalized, _lines)) => results.push((mode_key, normalized)),
                Err(err) => failures.push((mode_key, err))
            }
        }

        for (mode_key, normalized) in &results {
            let result = AnalysisResult {
                analysis_id: analysis.id,
                mode_key: mode_key.clone(),
                raw_text_ref: Some(stored_path.to_string()),
                structured_payload: normalized.payload.clone(),
                schema_version: 1,
                produced_at: Utc::now()
            };
            self.repos
                .analyses
                .upsert_result(&result)
                .await
                .map_err(|e| RunFailure::Single(AnalysisErrorKind::ParserFailure, e.to_string()))?;
        }

        if failures.is_empty() {
            return Ok(());
        }

        if analysis.mode_keys.len() == 1 {
            let (_, err) = &failures[0];
            let kind = match err {
                errors::ParserError::Timeout { .. } => AnalysisErrorKind::ParserTimeout,
                errors::ParserError::Oom { .. } => AnalysisErrorKind::ParserOom,
                _ => AnalysisErrorKind::ParserFailure
            };
            return Err(RunFailure::Single(kind, err.to_string()));
        }

        let summary = failures.iter().map(|(mode_key, err)| format!("{mode_key}: {err}")).collect::<Vec<_>>().join("; ");
        Err(RunFailure::Partial(summary))
    }

    /// Copies the object-store-backed archive to a local scratch file, since
    /// `archive::stat`/`filter_by_time` operate on a filesystem path rather
    /// than a stream.
    async fn materialize(&self, stored_ref: &str) -> Result<PathBuf, CoreError> {
        tokio::fs::create_dir_all(&self.scratch_dir).await.map_err(|e| CoreError::internal(e.to_string()))?;
        let mut reader = self.object_store.open_reader(stored_ref).await.map_err(CoreError::from)?;
        let dest = self.scratch_dir.join(format!("{}.src", uuid::Uuid::new_v4()));
        let mut file = tokio::fs::File::create(&dest).await.map_err(|e| CoreError::internal(e.to_string()))?;
        tokio::io::copy(&mut reader, &mut file).await.map_err(|e| CoreError::internal(e.to_string()))?;
        file.flush().await.map_err(|e| CoreError::internal(e.to_string()))?;
        Ok(dest)
    }
}

enum RunFailure {
    Cancelled,
    Single(AnalysisErrorKind, String),
    Partial(String)
}
