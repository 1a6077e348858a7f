// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! End-to-end lifecycle tests driving real child processes through
//! [`AgentRunner`] with stub shell scripts standing in for the agent CLI.

#![cfg(unix)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use drover::config::DroverConfig;
use drover::discovery::CapabilityCache;
use drover::exec::{AgentRunner, OutputSource, TokioRunner};
use drover::types::RunRequest;

const SESSION: &str = "7d9e1f00-1111-2222-3333-444455556666";

/// Write an executable stub script and return its path.
fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Runner preconfigured to treat `script` as the agent binary, with the
/// availability probe pre-populated so no real CLI is required.
fn runner_for(script: &Path) -> AgentRunner {
    let config = DroverConfig {
        agent_binary: script.display().to_string(),
        ..Default::default()
    };
    let cache = Arc::new(CapabilityCache::new(config.clone(), Arc::new(TokioRunner)));
    cache.set_cli_available(true);
    AgentRunner::new(config).with_capabilities(cache)
}

#[tokio::test]
async fn successful_run_captures_session_and_metrics() {
    let temp = tempfile::tempdir().unwrap();
    let script = write_script(
        temp.path(),
        "agent.sh",
        &format!(
            r#"echo "Session ID: {SESSION}"
echo "Total usage est: 2.5 premium requests"
echo "API time: 1m 5s"
echo "+12 -3 lines changed"
exit 0"#
        ),
    );

    let lines: Arc<Mutex<Vec<(OutputSource, String)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&lines);
    let runner = runner_for(&script).with_output_callback(Arc::new(move |source, line| {
        sink.lock().unwrap().push((source, line.to_string()));
    }));

    let request = RunRequest::new(temp.path(), "do the thing").with_job_id("JOB-OK");
    let result = runner.run(&request).await;

    assert!(result.success, "error: {:?}", result.error);
    assert_eq!(result.exit_code, Some(0));
    assert_eq!(result.session_id.as_deref(), Some(SESSION));

    let metrics = result.metrics.expect("metrics parsed from output");
    assert!((metrics.premium_requests - 2.5).abs() < f64::EPSILON);
    assert!((metrics.api_time_secs - 65.0).abs() < f64::EPSILON);
    assert_eq!(metrics.lines_added, 12);
    assert_eq!(metrics.lines_removed, 3);

    let lines = lines.lock().unwrap();
    assert!(lines
        .iter()
        .any(|(source, line)| *source == OutputSource::Stdout && line.contains(SESSION)));
}

#[tokio::test]
async fn nonzero_exit_is_failure_with_code() {
    let temp = tempfile::tempdir().unwrap();
    let script = write_script(temp.path(), "agent.sh", "echo partial work\nexit 3");

    let runner = runner_for(&script);
    let request = RunRequest::new(temp.path(), "task").with_job_id("JOB-EXIT3");
    let result = runner.run(&request).await;

    assert!(!result.success);
    assert_eq!(result.exit_code, Some(3));
    assert!(result.error.unwrap().contains("code 3"));
}

#[tokio::test]
async fn timeout_kills_the_process() {
    let temp = tempfile::tempdir().unwrap();
    let script = write_script(temp.path(), "agent.sh", "sleep 30");

    let runner = runner_for(&script);
    let request = RunRequest::new(temp.path(), "task")
        .with_job_id("JOB-SLOW")
        .with_timeout_ms(300);

    let start = std::time::Instant::now();
    let result = runner.run(&request).await;

    assert!(!result.success);
    assert!(result.error.unwrap().contains("timeout"));
    // SIGTERM path: well under the 30s the script would have slept.
    assert!(start.elapsed() < std::time::Duration::from_secs(10));
}

#[tokio::test]
async fn zero_timeout_is_unbounded() {
    let temp = tempfile::tempdir().unwrap();
    let script = write_script(temp.path(), "agent.sh", "sleep 0.2\nexit 0");

    let runner = runner_for(&script);
    let request = RunRequest::new(temp.path(), "task")
        .with_job_id("JOB-UNBOUNDED")
        .with_timeout_ms(0);

    let result = runner.run(&request).await;
    assert!(result.success);
}

#[tokio::test]
async fn instructions_file_visible_to_agent_and_removed_after() {
    let temp = tempfile::tempdir().unwrap();
    let script = write_script(
        temp.path(),
        "agent.sh",
        r#"if [ -f .github/instructions/JOB-INSTR.instructions.md ]; then
  echo INSTRUCTIONS_PRESENT
fi
exit 0"#,
    );

    let lines: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&lines);
    let runner = runner_for(&script).with_output_callback(Arc::new(move |_, line| {
        sink.lock().unwrap().push(line.to_string());
    }));

    let request = RunRequest::new(temp.path(), "write a test").with_job_id("JOB-INSTR");
    let result = runner.run(&request).await;

    assert!(result.success);
    assert!(lines
        .lock()
        .unwrap()
        .iter()
        .any(|line| line == "INSTRUCTIONS_PRESENT"));
    assert!(!temp.path().join(".github/instructions").exists());
}

#[tokio::test]
async fn instructions_removed_even_on_failure() {
    let temp = tempfile::tempdir().unwrap();
    let script = write_script(temp.path(), "agent.sh", "exit 7");

    let runner = runner_for(&script);
    let request = RunRequest::new(temp.path(), "task").with_job_id("JOB-FAIL");
    let result = runner.run(&request).await;

    assert!(!result.success);
    assert!(!temp
        .path()
        .join(".github/instructions/JOB-FAIL.instructions.md")
        .exists());
}

#[tokio::test]
async fn skip_instructions_writes_nothing() {
    let temp = tempfile::tempdir().unwrap();
    let script = write_script(
        temp.path(),
        "agent.sh",
        r#"if [ -d .github/instructions ]; then exit 9; fi
exit 0"#,
    );

    let runner = runner_for(&script);
    let mut request = RunRequest::new(temp.path(), "task").with_job_id("JOB-SKIP");
    request.skip_instructions_file = true;

    let result = runner.run(&request).await;
    assert!(result.success, "error: {:?}", result.error);
}

#[tokio::test]
async fn unavailable_cli_is_soft_success() {
    let temp = tempfile::tempdir().unwrap();
    let script = write_script(temp.path(), "agent.sh", "exit 0");

    let config = DroverConfig {
        agent_binary: script.display().to_string(),
        ..Default::default()
    };
    let cache = Arc::new(CapabilityCache::new(config.clone(), Arc::new(TokioRunner)));
    cache.set_cli_available(false);
    let runner = AgentRunner::new(config).with_capabilities(cache);

    let request = RunRequest::new(temp.path(), "task").with_job_id("JOB-NOCLI");
    let result = runner.run(&request).await;

    assert!(result.success);
    assert!(result.session_id.is_none());
    assert!(result.metrics.is_none());
    assert!(result.exit_code.is_none());
}

#[tokio::test]
async fn session_share_file_fallback() {
    let temp = tempfile::tempdir().unwrap();
    let script = write_script(
        temp.path(),
        "agent.sh",
        &format!(
            r#"mkdir -p .drover/logs/JOB-SHARE
printf '{{"session_id": "{SESSION}"}}' > .drover/logs/JOB-SHARE/session.json
exit 0"#
        ),
    );

    let runner = runner_for(&script);
    let request = RunRequest::new(temp.path(), "task").with_job_id("JOB-SHARE");
    let result = runner.run(&request).await;

    assert!(result.success);
    assert_eq!(result.session_id.as_deref(), Some(SESSION));
}
