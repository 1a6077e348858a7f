// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Minimal git interface for run bookkeeping.
//!
//! Callers record delegation outcomes by staging a single file and
//! committing, allow-empty so a run that changed nothing still leaves a
//! marker commit. Goes through [`CommandRunner`] like every other
//! external invocation.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::bail;
use tracing::debug;

use crate::error::Result;
use crate::exec::spawn::CommandRunner;

/// Timeout for git invocations; local operations should be quick.
const GIT_TIMEOUT_MS: u64 = 30_000;

pub struct GitClient {
    runner: Arc<dyn CommandRunner>,
    repo_root: PathBuf,
}

impl GitClient {
    pub fn new(runner: Arc<dyn CommandRunner>, repo_root: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            repo_root: repo_root.into(),
        }
    }

    /// Stage a single file.
    pub async fn stage_file(&self, path: &Path) -> Result<()> {
        self.git(&[
            "add".to_string(),
            "--".to_string(),
            path.display().to_string(),
        ])
        .await
    }

    /// Commit staged changes, allow-empty.
    pub async fn commit(&self, message: &str) -> Result<()> {
        self.git(&[
            "commit".to_string(),
            "--allow-empty".to_string(),
            "-m".to_string(),
            message.to_string(),
        ])
        .await
    }

    async fn git(&self, args: &[String]) -> Result<()> {
        debug!(?args, "Running git");
        let output = self
            .runner
            .capture("git", args, Some(self.repo_root.as_path()), GIT_TIMEOUT_MS)
            .await?;
        if !output.is_success() {
            bail!(
                "git {} failed: {}",
                args.first().map(String::as_str).unwrap_or(""),
                output.stderr.trim()
            );
        }
        Ok(())
    }
}
