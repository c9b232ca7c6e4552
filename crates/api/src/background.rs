//! Background retention scheduler (§4.5): runs soft- and hard-delete
//! sweeps on independent tickers, the same "one loop per interval"
//! shape the teacher codebase gives its own maintenance tasks.

use std::sync::Arc;
use std::time::Duration;

use config::RetentionConfig;
use retention::RetentionEngine;

pub fn spawn(engine: Arc<RetentionEngine>, config: RetentionConfig) {
    tokio::spawn(soft_sweep_loop(Arc::clone(&engine), config.soft_sweep_interval_secs));
    tokio::spawn(hard_sweep_loop(engine, config.hard_sweep_interval_secs));
}

async fn soft_sweep_loop(engine: Arc<RetentionEngine>, interval_secs: u64) {
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
    loop {
        ticker.tick().await;
        match engine.soft_sweep(chrono::Utc::now()).await {
            Ok(report) => tracing::info!(?report, "soft-delete sweep completed"),
            Err(e) => tracing::warn!(error = ?e, "soft-delete sweep failed")
        }
    }
}

async fn hard_sweep_loop(engine: Arc<RetentionEngine>, interval_secs: u64) {
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
    loop {
        ticker.tick().await;
        match engine.hard_sweep(chrono::Utc::now()).await {
            Ok(report) => tracing::info!(?report, "hard-delete sweep completed"),
            Err(e) => tracing::warn!(error = ?e, "hard-delete sweep failed")
        }
    }
}
