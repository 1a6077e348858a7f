// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Agent invocation builder.
//!
//! Turns a [`RunRequest`] plus configuration into the program and argument
//! vector for one agent process. All access grants are explicit and
//! fail-closed: only absolute, existing directories are passed through,
//! URLs go through the sanitizer one by one, and no flag ever grants
//! blanket filesystem or network access.

pub mod sanitize;

use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::config::DroverConfig;
use crate::error::CommandError;
use crate::types::{is_valid_access_dir, RunRequest};

pub use sanitize::sanitize_url;

/// A fully resolved agent invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    /// Render the invocation as a single display/shell string.
    ///
    /// Every argument is encoded as a JSON string literal, so task text
    /// and paths cannot smuggle shell metacharacters into the command.
    pub fn render(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.clone());
        for arg in &self.args {
            // serde_json string encoding doubles as strict shell quoting.
            parts.push(serde_json::to_string(arg).unwrap_or_default());
        }
        parts.join(" ")
    }
}

/// Build the agent invocation for a run request.
///
/// Directory grants are validated and deduplicated with the working
/// directory always first; URL grants are sanitized independently and
/// dropped (with an audit log line) on rejection. Optional flags are
/// appended after the mandatory ones so their presence never reorders
/// the base invocation.
pub fn build_invocation(
    request: &RunRequest,
    config: &DroverConfig,
) -> Result<Invocation, CommandError> {
    if request.task.trim().is_empty() {
        return Err(CommandError::EmptyTask);
    }

    let dirs = resolve_access_dirs(request)?;
    let urls = resolve_allowed_urls(&request.allowed_urls);

    let mut args = Vec::new();

    // Mandatory flags, fixed order: directory grants, network grants, task.
    for dir in &dirs {
        args.push("--add-dir".to_string());
        args.push(dir.to_string_lossy().into_owned());
    }
    for url in &urls {
        args.push("--allow-url".to_string());
        args.push(url.clone());
    }
    args.push("-p".to_string());
    args.push(request.task.clone());

    // Optional flags, appended only when provided.
    if let Some(model) = &request.model {
        args.push("--model".to_string());
        args.push(model.clone());
    }
    if let Some(session) = &request.resume_session {
        args.push("--resume".to_string());
        args.push(session.clone());
    }
    if let Some(turns) = request.max_turns {
        args.push("--max-turns".to_string());
        args.push(turns.to_string());
    }

    let log_dir = config.log_root.join(&request.job_id);
    args.push("--log-dir".to_string());
    args.push(log_dir.to_string_lossy().into_owned());
    args.push("--share".to_string());
    args.push(log_dir.join("session.json").to_string_lossy().into_owned());

    if let Some(config_dir) = &config.config_dir {
        args.push("--config-dir".to_string());
        args.push(config_dir.to_string_lossy().into_owned());
    }

    Ok(Invocation {
        program: config.agent_binary.clone(),
        args,
    })
}

/// Resolve the directories the agent may access.
///
/// The working directory comes first; explicit grants follow in caller
/// order, minus duplicates, relative paths, and nonexistent paths. If
/// nothing resolves, the process current directory is the fallback so the
/// invocation never carries a relative default.
fn resolve_access_dirs(request: &RunRequest) -> Result<Vec<PathBuf>, CommandError> {
    let mut dirs: Vec<PathBuf> = Vec::new();

    if is_valid_access_dir(&request.cwd) {
        dirs.push(request.cwd.clone());
    } else {
        warn!(
            cwd = %request.cwd.display(),
            "Working directory is not an absolute existing path; dropping"
        );
    }

    for folder in &request.allowed_folders {
        if !folder.is_absolute() {
            warn!(folder = %folder.display(), "Dropping relative allowed folder");
            continue;
        }
        if !folder.exists() {
            warn!(folder = %folder.display(), "Dropping nonexistent allowed folder");
            continue;
        }
        if !dirs.contains(folder) {
            dirs.push(folder.clone());
        }
    }

    if dirs.is_empty() {
        let fallback = std::env::current_dir()
            .map_err(|e| CommandError::NoWorkingDirectory(e.to_string()))?;
        warn!(
            fallback = %fallback.display(),
            "No valid access directories resolved; using process current directory"
        );
        dirs.push(fallback);
    }

    Ok(dirs)
}

/// Sanitize the URL allowlist, dropping rejected entries.
fn resolve_allowed_urls(candidates: &[String]) -> Vec<String> {
    if candidates.is_empty() {
        debug!("No URL allowlist supplied; network access disabled");
        return Vec::new();
    }

    let mut urls = Vec::new();
    for candidate in candidates {
        match sanitize_url(candidate) {
            Ok(url) => urls.push(url),
            Err(e) => {
                warn!(url = %candidate, reason = %e, "Rejected allowlist URL");
            }
        }
    }

    if urls.is_empty() {
        info!("All allowlist URLs were rejected; network access disabled");
    }
    urls
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn request_in(dir: &std::path::Path) -> RunRequest {
        RunRequest::new(dir, "echo hello").with_job_id("JOB-1")
    }

    fn dir_flags(invocation: &Invocation) -> Vec<String> {
        invocation
            .args
            .windows(2)
            .filter(|w| w[0] == "--add-dir")
            .map(|w| w[1].clone())
            .collect()
    }

    #[test]
    fn test_cwd_always_first() {
        let temp = tempdir().unwrap();
        let other = tempdir().unwrap();
        let request = request_in(temp.path())
            .with_allowed_folders(vec![other.path().to_path_buf()]);

        let invocation = build_invocation(&request, &DroverConfig::default()).unwrap();
        let dirs = dir_flags(&invocation);
        assert_eq!(dirs.len(), 2);
        assert_eq!(dirs[0], temp.path().to_string_lossy());
        assert_eq!(dirs[1], other.path().to_string_lossy());
    }

    #[test]
    fn test_cwd_deduplicated() {
        let temp = tempdir().unwrap();
        let request = request_in(temp.path())
            .with_allowed_folders(vec![temp.path().to_path_buf()]);

        let invocation = build_invocation(&request, &DroverConfig::default()).unwrap();
        assert_eq!(dir_flags(&invocation).len(), 1);
    }

    #[test]
    fn test_relative_and_missing_folders_dropped() {
        let temp = tempdir().unwrap();
        let request = request_in(temp.path()).with_allowed_folders(vec![
            PathBuf::from("relative/path"),
            temp.path().join("does-not-exist"),
        ]);

        let invocation = build_invocation(&request, &DroverConfig::default()).unwrap();
        let dirs = dir_flags(&invocation);
        assert_eq!(dirs.len(), 1);
        assert!(!invocation.render().contains("relative/path"));
        assert!(!invocation.render().contains("does-not-exist"));
    }

    #[test]
    fn test_missing_cwd_falls_back_to_process_dir() {
        let request = request_in(std::path::Path::new("/definitely/not/here"));
        let invocation = build_invocation(&request, &DroverConfig::default()).unwrap();
        let dirs = dir_flags(&invocation);
        assert_eq!(dirs.len(), 1);
        // Never a relative default.
        assert!(PathBuf::from(&dirs[0]).is_absolute());
    }

    #[test]
    fn test_empty_task_rejected() {
        let temp = tempdir().unwrap();
        let request = RunRequest::new(temp.path(), "   ");
        assert!(matches!(
            build_invocation(&request, &DroverConfig::default()),
            Err(CommandError::EmptyTask)
        ));
    }

    #[test]
    fn test_no_urls_means_no_network_flags() {
        let temp = tempdir().unwrap();
        let invocation =
            build_invocation(&request_in(temp.path()), &DroverConfig::default()).unwrap();
        assert!(!invocation.args.contains(&"--allow-url".to_string()));
    }

    #[test]
    fn test_bad_urls_dropped_build_still_succeeds() {
        let temp = tempdir().unwrap();
        let request = request_in(temp.path()).with_allowed_urls(vec![
            "https://ok.example.com".to_string(),
            "https://bad.com/;rm".to_string(),
            "--inject".to_string(),
        ]);

        let invocation = build_invocation(&request, &DroverConfig::default()).unwrap();
        let urls: Vec<_> = invocation
            .args
            .windows(2)
            .filter(|w| w[0] == "--allow-url")
            .map(|w| w[1].clone())
            .collect();
        assert_eq!(urls, vec!["https://ok.example.com"]);
    }

    #[test]
    fn test_optional_flags_follow_mandatory() {
        let temp = tempdir().unwrap();
        let request = request_in(temp.path())
            .with_model("claude-sonnet-4.5")
            .with_resume_session("11111111-2222-3333-4444-555555555555")
            .with_max_turns(3);

        let invocation = build_invocation(&request, &DroverConfig::default()).unwrap();
        let prompt_pos = invocation.args.iter().position(|a| a == "-p").unwrap();
        let model_pos = invocation.args.iter().position(|a| a == "--model").unwrap();
        let resume_pos = invocation.args.iter().position(|a| a == "--resume").unwrap();
        assert!(prompt_pos < model_pos);
        assert!(model_pos < resume_pos);

        // Mandatory prefix is identical without the optional flags.
        let bare = build_invocation(&request_in(temp.path()), &DroverConfig::default()).unwrap();
        assert_eq!(&invocation.args[..=prompt_pos], &bare.args[..=prompt_pos]);
    }

    #[test]
    fn test_render_quotes_arguments() {
        let temp = tempdir().unwrap();
        let request = RunRequest::new(temp.path(), "say \"hi\"; rm -rf /");
        let invocation = build_invocation(&request, &DroverConfig::default()).unwrap();
        let rendered = invocation.render();
        // The task arrives as one JSON string literal, metacharacters inert.
        assert!(rendered.contains("\"say \\\"hi\\\"; rm -rf /\""));
    }

    #[test]
    fn test_never_emits_blanket_access_flags() {
        let temp = tempdir().unwrap();
        let invocation =
            build_invocation(&request_in(temp.path()), &DroverConfig::default()).unwrap();
        for arg in &invocation.args {
            assert!(!arg.contains("--allow-all"), "unexpected flag: {arg}");
        }
    }
}
