// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Per-job instructions file.
//!
//! The agent reads task instructions from a conventional
//! `.github/instructions/` file inside the working directory. The file is
//! transient: it is written just before spawn and removed on every exit
//! path, including spawn failures, so partial runs leave nothing behind.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::ExecError;

const INSTRUCTIONS_DIR: &str = ".github/instructions";

/// Path of the instructions file for a job inside `cwd`.
pub fn instructions_path(cwd: &Path, job_id: &str) -> PathBuf {
    cwd.join(INSTRUCTIONS_DIR)
        .join(format!("{job_id}.instructions.md"))
}

/// Write the instructions file, creating the directory as needed.
pub async fn write_instructions(
    cwd: &Path,
    job_id: &str,
    task: &str,
) -> Result<PathBuf, ExecError> {
    let path = instructions_path(cwd, job_id);
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ExecError::IoError(e.to_string()))?;
    }
    tokio::fs::write(&path, task)
        .await
        .map_err(|e| ExecError::IoError(e.to_string()))?;
    debug!(path = %path.display(), "Wrote instructions file");
    Ok(path)
}

/// Remove the instructions file and its directory when empty.
///
/// Best-effort: failures are logged, never raised, so cleanup can run on
/// every exit path without masking the run's own outcome.
pub async fn cleanup_instructions(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "Removed instructions file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove instructions file"),
    }

    if let Some(dir) = path.parent() {
        // Only removes when empty; ignore the expected failure otherwise.
        if tokio::fs::remove_dir(dir).await.is_ok() {
            debug!(dir = %dir.display(), "Removed empty instructions directory");
        }
    }
}
