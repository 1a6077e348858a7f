// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Process execution primitive.
//!
//! One-shot captured invocations (capability probes, augmentation calls)
//! go through the [`CommandRunner`] trait so tests can substitute doubles.
//! The long-lived supervised run in [`crate::exec`] drives
//! `tokio::process` directly because it needs live stream access.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::config::ENV_PREFIX;
use crate::error::ExecError;
use crate::types::CapturedOutput;

/// Executes a command to completion and captures its output.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args`, returning captured output.
    ///
    /// `timeout_ms` of zero means unbounded.
    async fn capture<'a>(
        &self,
        program: &str,
        args: &[String],
        cwd: Option<&'a Path>,
        timeout_ms: u64,
    ) -> Result<CapturedOutput, ExecError>;
}

/// The real runner backed by `tokio::process`.
#[derive(Debug, Default, Clone)]
pub struct TokioRunner;

#[async_trait]
impl CommandRunner for TokioRunner {
    async fn capture<'a>(
        &self,
        program: &str,
        args: &[String],
        cwd: Option<&'a Path>,
        timeout_ms: u64,
    ) -> Result<CapturedOutput, ExecError> {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }
        apply_sanitized_env(&mut cmd);

        debug!(program, timeout_ms, "Capturing command output");

        let output = if timeout_ms > 0 {
            match tokio::time::timeout(Duration::from_millis(timeout_ms), cmd.output()).await {
                Ok(result) => result,
                Err(_) => return Err(ExecError::Timeout(timeout_ms)),
            }
        } else {
            cmd.output().await
        }
        .map_err(|e| ExecError::SpawnFailed(e.to_string()))?;

        Ok(CapturedOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code(),
        })
    }
}

/// Replace the child environment with the host's, minus our own runtime
/// configuration variables, so `DROVER_*` settings do not leak into the
/// agent.
pub fn apply_sanitized_env(cmd: &mut Command) {
    cmd.env_clear();
    for (key, value) in std::env::vars() {
        if key.starts_with(ENV_PREFIX) {
            continue;
        }
        cmd.env(key, value);
    }
}
