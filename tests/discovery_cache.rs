// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Discovery cache behavior with a scripted runner and a synthetic
//! clock, so TTL expiry is exercised without real time or a real CLI.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use drover::config::DroverConfig;
use drover::discovery::{CapabilityCache, Clock};
use drover::error::ExecError;
use drover::exec::CommandRunner;
use drover::types::CapturedOutput;

const HELP_TEXT: &str = r#"
  --model <MODEL>  Model to use (choices: "claude-sonnet-4.5", "gpt-5-mini")
  --resume <ID>    Resume a session
"#;

/// Pops canned responses in order and counts invocations.
struct ScriptedRunner {
    responses: Mutex<Vec<CapturedOutput>>,
    calls: AtomicU64,
}

impl ScriptedRunner {
    fn new(responses: Vec<CapturedOutput>) -> Self {
        Self {
            responses: Mutex::new(responses),
            calls: AtomicU64::new(0),
        }
    }

    fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn capture<'a>(
        &self,
        _program: &str,
        _args: &[String],
        _cwd: Option<&'a Path>,
        _timeout_ms: u64,
    ) -> Result<CapturedOutput, ExecError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            panic!("scripted runner exhausted");
        }
        Ok(responses.remove(0))
    }
}

/// Clock whose reading is set explicitly by the test.
struct TestClock {
    now: Mutex<DateTime<Utc>>,
}

impl TestClock {
    fn at(secs: i64) -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(Utc.timestamp_opt(secs, 0).unwrap()),
        })
    }

    fn set(&self, secs: i64) {
        *self.now.lock().unwrap() = Utc.timestamp_opt(secs, 0).unwrap();
    }
}

impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

fn ok(stdout: &str) -> CapturedOutput {
    CapturedOutput {
        stdout: stdout.to_string(),
        stderr: String::new(),
        exit_code: Some(0),
    }
}

fn failed() -> CapturedOutput {
    CapturedOutput {
        stdout: String::new(),
        stderr: "boom".to_string(),
        exit_code: Some(1),
    }
}

#[tokio::test]
async fn model_cache_hits_until_success_ttl_elapses() {
    let runner = Arc::new(ScriptedRunner::new(vec![ok(HELP_TEXT), ok(HELP_TEXT)]));
    let clock = TestClock::at(0);
    let config = DroverConfig::default();
    let success_ttl = config.discovery_success_ttl.as_secs() as i64;

    let cache = CapabilityCache::new(config, Arc::clone(&runner) as Arc<dyn CommandRunner>)
        .with_clock(Arc::clone(&clock) as Arc<dyn Clock>);

    let first = cache.discover_models().await.unwrap();
    assert_eq!(first.raw_choices, vec!["claude-sonnet-4.5", "gpt-5-mini"]);
    assert_eq!(runner.calls(), 1);

    // Just inside the TTL: same cached timestamp, no new invocation.
    clock.set(success_ttl - 1);
    let second = cache.discover_models().await.unwrap();
    assert_eq!(second.discovered_at, first.discovered_at);
    assert_eq!(runner.calls(), 1);

    // Past the TTL: a fresh discovery with a new timestamp.
    clock.set(success_ttl + 1);
    let third = cache.discover_models().await.unwrap();
    assert_ne!(third.discovered_at, first.discovered_at);
    assert_eq!(runner.calls(), 2);
}

#[tokio::test]
async fn failure_ttl_suppresses_retries_then_expires() {
    let runner = Arc::new(ScriptedRunner::new(vec![failed(), ok(HELP_TEXT)]));
    let clock = TestClock::at(0);
    let config = DroverConfig::default();
    let failure_ttl = config.discovery_failure_ttl.as_secs() as i64;
    assert!(failure_ttl < config.discovery_success_ttl.as_secs() as i64);

    let cache = CapabilityCache::new(config, Arc::clone(&runner) as Arc<dyn CommandRunner>)
        .with_clock(Arc::clone(&clock) as Arc<dyn Clock>);

    assert!(cache.discover_models().await.is_err());
    assert_eq!(runner.calls(), 1);

    // Inside the failure window: error repeated without a retry.
    clock.set(failure_ttl - 1);
    assert!(cache.discover_models().await.is_err());
    assert_eq!(runner.calls(), 1);

    // Window elapsed: retried and now successful.
    clock.set(failure_ttl + 1);
    let result = cache.discover_models().await.unwrap();
    assert_eq!(result.models.len(), 2);
    assert_eq!(runner.calls(), 2);
}

#[tokio::test]
async fn refresh_bypasses_both_caches() {
    let runner = Arc::new(ScriptedRunner::new(vec![failed(), ok(HELP_TEXT)]));
    let clock = TestClock::at(0);

    let cache = CapabilityCache::new(
        DroverConfig::default(),
        Arc::clone(&runner) as Arc<dyn CommandRunner>,
    )
    .with_clock(Arc::clone(&clock) as Arc<dyn Clock>);

    assert!(cache.discover_models().await.is_err());
    // Still inside the failure TTL, but refresh re-invokes regardless.
    let result = cache.refresh_models().await.unwrap();
    assert_eq!(result.models.len(), 2);
    assert_eq!(runner.calls(), 2);
}

#[tokio::test]
async fn cli_probe_tries_variants_in_order() {
    // Wrapper help fails, plugin-list succeeds; the third variant is
    // never reached.
    let runner = Arc::new(ScriptedRunner::new(vec![failed(), ok("")]));
    let cache = CapabilityCache::new(
        DroverConfig::default(),
        Arc::clone(&runner) as Arc<dyn CommandRunner>,
    );

    assert!(cache.check_cli_available().await);
    assert_eq!(runner.calls(), 2);

    // Cached thereafter.
    assert!(cache.check_cli_available().await);
    assert_eq!(runner.calls(), 2);
}

#[tokio::test]
async fn reset_clears_cached_availability() {
    let runner = Arc::new(ScriptedRunner::new(vec![
        failed(),
        failed(),
        failed(),
        ok(""),
    ]));
    let cache = CapabilityCache::new(
        DroverConfig::default(),
        Arc::clone(&runner) as Arc<dyn CommandRunner>,
    );

    assert!(!cache.check_cli_available().await);
    assert_eq!(runner.calls(), 3);

    cache.reset_cli_cache();
    assert!(!cache.cli_cache_populated());
    assert!(cache.check_cli_available().await);
    assert_eq!(runner.calls(), 4);
}
