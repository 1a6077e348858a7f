// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Agent process lifecycle manager.
//!
//! One [`AgentRunner::run`] call supervises exactly one agent process:
//! spawn with a sanitized environment, stream stdout/stderr line by line
//! into the caller's callback and the usage scanner, enforce an optional
//! timeout with a platform-appropriate kill, normalize the exit status,
//! and guarantee instructions-file cleanup on every exit path.
//!
//! Failures never escape as errors; every outcome is a structured
//! [`RunResult`].

pub mod instructions;
pub mod session;
pub mod spawn;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::command::build_invocation;
use crate::config::DroverConfig;
use crate::discovery::CapabilityCache;
use crate::error::ExecError;
use crate::stats::UsageScanner;
#[cfg(feature = "telemetry")]
use crate::telemetry::GLOBAL_METRICS;
use crate::types::{RunRequest, RunResult};

use session::{resolve_session_id, SessionCapture};
use spawn::apply_sanitized_env;
pub use spawn::{CommandRunner, TokioRunner};

/// Output marker that lets a missing exit status normalize to success.
/// Some shells fail to propagate the child's real status; an agent that
/// printed its completion banner and exited without a signal did finish.
const COMPLETION_MARKER: &str = "Task complete";

/// Timer clamp, the platform's maximum representable delay.
const MAX_TIMER_DELAY_MS: u64 = i32::MAX as u64;

/// Grace period between the polite and the forced kill on Unix.
const KILL_GRACE: Duration = Duration::from_secs(2);

/// Which stream an output line arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputSource {
    Stdout,
    Stderr,
}

/// Live output callback: one call per line, per stream.
pub type OutputCallback = Arc<dyn Fn(OutputSource, &str) + Send + Sync>;

/// Supervises agent processes, one per run request.
///
/// Holds no per-run state; a single runner can drive many concurrent
/// runs, each owning its own child process and working directory.
pub struct AgentRunner {
    config: DroverConfig,
    capabilities: Arc<CapabilityCache>,
    on_output: Option<OutputCallback>,
}

impl AgentRunner {
    pub fn new(config: DroverConfig) -> Self {
        let capabilities = Arc::new(CapabilityCache::new(
            config.clone(),
            Arc::new(TokioRunner),
        ));
        Self {
            config,
            capabilities,
            on_output: None,
        }
    }

    /// Use a shared capability cache instead of a private one.
    pub fn with_capabilities(mut self, capabilities: Arc<CapabilityCache>) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Receive every output line as it arrives.
    pub fn with_output_callback(mut self, callback: OutputCallback) -> Self {
        self.on_output = Some(callback);
        self
    }

    pub fn capabilities(&self) -> &Arc<CapabilityCache> {
        &self.capabilities
    }

    /// Execute one delegation run to completion or forced termination.
    pub async fn run(&self, request: &RunRequest) -> RunResult {
        #[cfg(feature = "telemetry")]
        let start = std::time::Instant::now();

        let result = self.run_inner(request).await;

        #[cfg(feature = "telemetry")]
        {
            GLOBAL_METRICS.record_operation("run", start.elapsed(), result.success);
            if let Some(tokens) = result.metrics.as_ref().and_then(|m| m.tokens.as_ref()) {
                GLOBAL_METRICS.record_tokens(tokens.input_tokens, tokens.output_tokens);
            }
        }

        result
    }

    async fn run_inner(&self, request: &RunRequest) -> RunResult {
        // A missing CLI is a soft condition: report success with no
        // session or metrics so the node can be completed manually.
        if !self.capabilities.check_cli_available().await {
            info!(job = %request.job_id, "Agent CLI unavailable; skipping delegation");
            return RunResult {
                success: true,
                ..Default::default()
            };
        }

        let invocation = match build_invocation(request, &self.config) {
            Ok(invocation) => invocation,
            Err(e) => return RunResult::failure(e.to_string()),
        };
        debug!(job = %request.job_id, command = %invocation.render(), "Built agent invocation");

        let cwd = self.resolve_spawn_cwd(request);

        let instructions_file = if request.skip_instructions_file {
            None
        } else {
            match instructions::write_instructions(&cwd, &request.job_id, &request.task).await {
                Ok(path) => Some(path),
                Err(e) => return RunResult::failure(format!("Failed to write instructions: {e}")),
            }
        };

        // Finally semantics: the supervised future resolves (or errors)
        // first, then cleanup runs unconditionally.
        let result = self
            .supervise(request, &cwd, &invocation.program, &invocation.args)
            .await;

        if let Some(path) = &instructions_file {
            instructions::cleanup_instructions(path).await;
        }

        result
    }

    fn resolve_spawn_cwd(&self, request: &RunRequest) -> PathBuf {
        if request.cwd.exists() {
            request.cwd.clone()
        } else {
            warn!(cwd = %request.cwd.display(), "Working directory missing; spawning in process directory");
            std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"))
        }
    }

    fn log_dir(&self, cwd: &Path, job_id: &str) -> PathBuf {
        let root = if self.config.log_root.is_absolute() {
            self.config.log_root.clone()
        } else {
            cwd.join(&self.config.log_root)
        };
        root.join(job_id)
    }

    async fn supervise(
        &self,
        request: &RunRequest,
        cwd: &Path,
        program: &str,
        args: &[String],
    ) -> RunResult {
        let log_dir = self.log_dir(cwd, &request.job_id);
        if let Err(e) = tokio::fs::create_dir_all(&log_dir).await {
            warn!(dir = %log_dir.display(), error = %e, "Failed to create log directory");
        }

        let mut cmd = Command::new(program);
        cmd.args(args)
            .current_dir(cwd)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true);
        apply_sanitized_env(&mut cmd);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                // The process never started; nothing to kill or reap.
                return RunResult::failure(ExecError::SpawnFailed(e.to_string()).to_string());
            }
        };

        let mut scanner = UsageScanner::new();
        let mut capture = SessionCapture::new(request.resume_session.clone());
        let mut saw_completion = false;

        // Both streams are piped above, so take() always yields them.
        let (stdout, stderr) = match (child.stdout.take(), child.stderr.take()) {
            (Some(out), Some(err)) => (out, err),
            _ => {
                terminate(&mut child).await;
                return RunResult::failure("Agent process streams were not captured");
            }
        };

        let wait_result = {
            let supervise = async {
                let mut out_lines = BufReader::new(stdout).lines();
                let mut err_lines = BufReader::new(stderr).lines();
                let mut out_done = false;
                let mut err_done = false;

                // Per-stream ordering is preserved; interleaving across
                // the two streams is whatever the OS delivers.
                while !(out_done && err_done) {
                    tokio::select! {
                        line = out_lines.next_line(), if !out_done => {
                            match line {
                                Ok(Some(line)) => self.handle_line(
                                    OutputSource::Stdout,
                                    &line,
                                    &mut scanner,
                                    &mut capture,
                                    &mut saw_completion,
                                ),
                                _ => out_done = true,
                            }
                        }
                        line = err_lines.next_line(), if !err_done => {
                            match line {
                                Ok(Some(line)) => self.handle_line(
                                    OutputSource::Stderr,
                                    &line,
                                    &mut scanner,
                                    &mut capture,
                                    &mut saw_completion,
                                ),
                                _ => err_done = true,
                            }
                        }
                    }
                }

                child.wait().await
            };

            if request.timeout_ms > 0 {
                let clamped = request.timeout_ms.min(MAX_TIMER_DELAY_MS);
                // Bound first so the supervised future (and its borrows)
                // is dropped before the kill path touches the child.
                let outcome =
                    tokio::time::timeout(Duration::from_millis(clamped), supervise).await;
                match outcome {
                    Ok(result) => result,
                    Err(_) => {
                        // Timer fired: the supervised future is dropped,
                        // which releases the child for termination.
                        terminate(&mut child).await;
                        let session_id = resolve_session_id(capture, &log_dir);
                        return RunResult {
                            success: false,
                            session_id,
                            error: Some(format!(
                                "Agent process killed by timeout after {}ms",
                                request.timeout_ms
                            )),
                            exit_code: None,
                            metrics: scanner.into_metrics(),
                        };
                    }
                }
            } else {
                supervise.await
            }
        };

        let status = match wait_result {
            Ok(status) => status,
            Err(e) => return RunResult::failure(format!("Failed to await agent process: {e}")),
        };

        let session_id = resolve_session_id(capture, &log_dir);
        let metrics = scanner.into_metrics();

        match normalize_exit(&status, saw_completion) {
            NormalizedExit::Success(code) => RunResult {
                success: true,
                session_id,
                error: None,
                exit_code: Some(code),
                metrics,
            },
            NormalizedExit::NonZero(code) => RunResult {
                success: false,
                session_id,
                error: Some(format!("Agent process exited with code {code}")),
                exit_code: Some(code),
                metrics,
            },
            NormalizedExit::Signaled(signal) => RunResult {
                success: false,
                session_id,
                error: Some(format!("Agent process killed by signal {signal}")),
                exit_code: None,
                metrics,
            },
            NormalizedExit::Unknown => RunResult {
                success: false,
                session_id,
                error: Some("Agent process exited without a status".to_string()),
                exit_code: None,
                metrics,
            },
        }
    }

    fn handle_line(
        &self,
        source: OutputSource,
        line: &str,
        scanner: &mut UsageScanner,
        capture: &mut SessionCapture,
        saw_completion: &mut bool,
    ) {
        if let Some(callback) = &self.on_output {
            callback(source, line);
        }
        scanner.feed_line(line);
        capture.feed_line(line);
        if line.contains(COMPLETION_MARKER) {
            *saw_completion = true;
        }
    }
}

enum NormalizedExit {
    Success(i32),
    NonZero(i32),
    Signaled(i32),
    Unknown,
}

fn normalize_exit(status: &std::process::ExitStatus, saw_completion: bool) -> NormalizedExit {
    match status.code() {
        Some(0) => NormalizedExit::Success(0),
        Some(code) => NormalizedExit::NonZero(code),
        None => {
            #[cfg(unix)]
            {
                use std::os::unix::process::ExitStatusExt;
                if let Some(signal) = status.signal() {
                    return NormalizedExit::Signaled(signal);
                }
            }
            // No code, no signal: trust the completion banner.
            if saw_completion {
                NormalizedExit::Success(0)
            } else {
                NormalizedExit::Unknown
            }
        }
    }
}

/// Kill the child: polite first where the platform supports it.
async fn terminate(child: &mut Child) {
    #[cfg(unix)]
    {
        if let Some(pid) = child.id() {
            unsafe {
                libc::kill(pid as libc::pid_t, libc::SIGTERM);
            }
            if tokio::time::timeout(KILL_GRACE, child.wait()).await.is_ok() {
                return;
            }
            warn!(pid, "Agent ignored SIGTERM; escalating");
        }
        let _ = child.start_kill();
        let _ = child.wait().await;
        return;
    }

    #[cfg(not(unix))]
    {
        // Windows has no graceful signal; terminate the process hard.
        let _ = child.start_kill();
        let _ = child.wait().await;
    }
}
