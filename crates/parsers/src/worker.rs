use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use errors::ParserError;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::time::timeout;

use crate::normalize::{normalize_csv, normalize_free_text, normalize_key_value, normalize_structured_blocks, NormalizedOutput};
use crate::registry::{OutputShape, ParserMode};

/// Grace window between SIGTERM and SIGKILL on cancellation (§4.4 default 5s).
pub const CANCEL_GRACE: Duration = Duration::from_secs(5);

/// Default per-invocation wall-clock timeout (§4.3 default 10 minutes).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Debug, Clone)]
pub enum WorkerEvent {
    /// Best-effort progress signal — either a parsed line count or a plain
    /// heartbeat, reported at least once a second while the parser runs.
    Progress { lines_seen: u64 },
    Finished
}

/// Cooperative cancellation flag a caller flips; the worker observes it
/// between stdout chunks rather than polling a shared job-coordinator state
/// directly, so this crate stays decoupled from `jobs`.
#[derive(Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Runs one parser mode to completion against an archive, returning
/// normalized structured output. Enforces the wall-clock timeout and the
/// memory soft cap, and forwards progress on `progress_tx`.
#[allow(clippy::too_many_arguments)]
pub async fn run_mode(
    mode: &ParserMode,
    archive_path: &str,
    timezone: &str,
    window: Option<(&str, &str)>,
    timeout_duration: Duration,
    memory_cap_bytes: Option<u64>,
    cancel: CancelFlag,
    progress_tx: Option<mpsc::Sender<WorkerEvent>>
) -> Result<(NormalizedOutput, u64), ParserError> {
    let args = mode.spawn_args(archive_path, timezone, window);
    let Some((program, rest)) = args.split_first() else {
        return Err(ParserError::Spawn { reason: "empty spawn_args_template".to_string() });
    };

    let mut command = Command::new(program);
    command.args(rest).stdout(Stdio::piped()).stderr(Stdio::piped()).kill_on_drop(true);

    let mut child = command.spawn().map_err(|e| ParserError::Spawn { reason: e.to_string() })?;
    let stdout = child.stdout.take().expect("stdout was piped");
    let mut reader = BufReader::new(stdout).lines();
    let child_pid = child.id();

    let mut raw = String::new();
    let mut line_count: u64 = 0;
    let mut last_report = tokio::time::Instant::now();

    let read_loop = async {
        loop {
            if cancel.is_cancelled() {
                return Err(ParserError::Failure { code: None });
            }
            if let (Some(cap), Some(pid)) = (memory_cap_bytes, child_pid) {
                if rss_bytes(pid).is_some_and(|rss| rss > cap) {
                    return Err(ParserError::Oom { cap_bytes: cap });
                }
            }

            match reader.next_line().await {
                Ok(Some(line)) => {
                    raw.push_str(&line);
                    raw.push('\n');
                    line_count += 1;

                    if last_report.elapsed() >= Duration::from_secs(1) {
                        if let Some(tx) = &progress_tx {
                            let _ = tx.send(WorkerEvent::Progress { lines_seen: line_count }).await;
                        }
                        last_report = tokio::time::Instant::now();
                    }
                }
                Ok(None) => break,
                Err(_io_err) => return Err(ParserError::Failure { code: None })
            }
        }
        Ok(())
    };

    let outcome = timeout(timeout_duration, read_loop).await;
    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            terminate(&mut child).await;
            return Err(e);
        }
        Err(_elapsed) => {
            terminate(&mut child).await;
            return Err(ParserError::Timeout { timeout_secs: timeout_duration.as_secs() });
        }
    }

    let status = child.wait().await.map_err(|e| ParserError::Spawn { reason: e.to_string() })?;
    if !status.success() {
        return Err(ParserError::Failure { code: status.code() });
    }

    if let Some(tx) = &progress_tx {
        let _ = tx.send(WorkerEvent::Finished).await;
    }

    let normalized = match mode.output_shape {
        OutputShape::Csv => normalize_csv(&raw),
        OutputShape::KeyValue => normalize_key_value(&raw),
        OutputShape::StructuredBlocks => {
            let pattern = mode.block_header_pattern.as_ref().expect("structured_blocks mode must carry a pattern");
            normalize_structured_blocks(&raw, pattern)
        }
        OutputShape::FreeText => normalize_free_text(&raw, mode.free_text_line_cap)
    };

    Ok((normalized, line_count))
}

/// Best-effort RSS read from `/proc/{pid}/status` (Linux only; returns
/// `None` elsewhere or if the process has already exited, treated as "under
/// cap" by the caller).
#[cfg(target_os = "linux")]
fn rss_bytes(pid: u32) -> Option<u64> {
    let status = std::fs::read_to_string(format!("/proc/{pid}/status")).ok()?;
    let line = status.lines().find(|l| l.starts_with("VmRSS:"))?;
    let kib: u64 = line.split_whitespace().nth(1)?.parse().ok()?;
    Some(kib * 1024)
}

#[cfg(not(target_os = "linux"))]
fn rss_bytes(_pid: u32) -> Option<u64> {
    None
}

/// SIGTERM, then SIGKILL after `CANCEL_GRACE` if the child has not exited.
async fn terminate(child: &mut tokio::process::Child) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        use nix::sys::signal::{self, Signal};
        use nix::unistd::Pid;
        let _ = signal::kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
    }

    if timeout(CANCEL_GRACE, child.wait()).await.is_err() {
        let _ = child.kill().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ParserRegistry;

    fn shell_mode(mode_key: &str, script: &str) -> ParserMode {
        ParserMode {
            mode_key: mode_key.to_string(),
            spawn_args_template: vec!["sh".to_string(), "-c".to_string(), script.to_string()],
            output_shape: OutputShape::FreeText,
            block_header_pattern: None,
            free_text_line_cap: 1000
        }
    }

    #[tokio::test]
    async fn run_mode_captures_stdout_and_succeeds() {
        let mode = shell_mode("echo_test", "printf 'a\\nb\\n'");
        let (output, lines) = run_mode(&mode, "unused", "UTC", None, Duration::from_secs(5), None, CancelFlag::new(), None)
            .await
            .unwrap();
        assert_eq!(lines, 2);
        assert_eq!(output.payload["total_line_count"], serde_json::json!(2));
    }

    #[tokio::test]
    async fn run_mode_reports_nonzero_exit_as_parser_failure() {
        let mode = shell_mode("fail_test", "exit 3");
        let result = run_mode(&mode, "unused", "UTC", None, Duration::from_secs(5), None, CancelFlag::new(), None).await;
        assert!(matches!(result, Err(ParserError::Failure { code: Some(3) })));
    }

    #[tokio::test]
    async fn run_mode_times_out_on_long_running_child() {
        let mode = shell_mode("slow_test", "sleep 5");
        let result = run_mode(&mode, "unused", "UTC", None, Duration::from_millis(200), None, CancelFlag::new(), None).await;
        assert!(matches!(result, Err(ParserError::Timeout { .. })));
    }

    #[test]
    fn builtin_registry_exposes_expected_modes() {
        let registry = ParserRegistry::builtin();
        let keys: Vec<&str> = registry.mode_keys().collect();
        assert!(keys.contains(&"bandwidth"));
        assert!(keys.contains(&"raw_syslog"));
    }
}
