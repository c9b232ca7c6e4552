//! Parser registry & worker (C3): spawns parser processes, enforces
//! timeouts and the memory soft cap, and normalizes their output into
//! structured records per mode.

pub mod normalize;
pub mod registry;
pub mod worker;

use std::sync::Arc;
use std::time::Duration;

use config::ParserConfig;
use errors::ParserError;
use registry::ParserRegistry;
use tokio::sync::{mpsc, Semaphore};
use worker::{run_mode, CancelFlag, WorkerEvent};

pub use normalize::NormalizedOutput;

/// Bounds how many parser child processes run concurrently (§4.3: "fixed
/// number of concurrent parser processes, default = number of cores").
pub struct WorkerPool {
    registry: Arc<ParserRegistry>,
    config: ParserConfig,
    slots: Arc<Semaphore>
}

impl WorkerPool {
    pub fn new(registry: ParserRegistry, config: ParserConfig, pool_size: usize) -> Self {
        Self { registry: Arc::new(registry), config, slots: Arc::new(Semaphore::new(pool_size.max(1))) }
    }

    /// Runs `mode_key` against `archive_path`, blocking until a pool slot is
    /// free. `UnknownMode` is returned without consuming a slot.
    pub async fn run(
        &self,
        mode_key: &str,
        archive_path: &str,
        timezone: &str,
        window: Option<(&str, &str)>,
        cancel: CancelFlag,
        progress_tx: Option<mpsc::Sender<WorkerEvent>>
    ) -> Result<(NormalizedOutput, u64), ParserError> {
        let mode = self
            .registry
            .get(mode_key)
            .ok_or_else(|| ParserError::UnknownMode { mode_key: mode_key.to_string() })?
            .clone();

        let _permit = self.slots.acquire().await.expect("semaphore is never closed");

        run_mode(
            &mode,
            archive_path,
            timezone,
            window,
            Duration::from_secs(self.config.default_timeout_secs),
            Some(self.config.default_memory_cap_bytes),
            cancel,
            progress_tx
        )
        .await
    }

    pub fn mode_keys(&self) -> Vec<String> {
        self.registry.mode_keys().map(str::to_string).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use registry::{OutputShape, ParserMode};

    fn test_pool(pool_size: usize) -> WorkerPool {
        let registry = ParserRegistry::new(vec![ParserMode {
            mode_key: "echo".to_string(),
            spawn_args_template: vec!["sh".to_string(), "-c".to_string(), "printf 'x\\n'".to_string()],
            output_shape: OutputShape::FreeText,
            block_header_pattern: None,
            free_text_line_cap: 10
        }]);
        WorkerPool::new(registry, ParserConfig::default(), pool_size)
    }

    #[tokio::test]
    async fn unknown_mode_key_fails_without_spawning() {
        let pool = test_pool(2);
        let result = pool.run("nonexistent", "a", "UTC", None, CancelFlag::new(), None).await;
        assert!(matches!(result, Err(ParserError::UnknownMode { .. })));
    }

    #[tokio::test]
    async fn runs_registered_mode_successfully() {
        let pool = test_pool(2);
        let (output, lines) = pool.run("echo", "a", "UTC", None, CancelFlag::new(), None).await.unwrap();
        assert_eq!(lines, 1);
        assert_eq!(output.payload["total_line_count"], serde_json::json!(1));
    }
}
