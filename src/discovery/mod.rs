// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Capability discovery and caching.
//!
//! Answers "is the agent CLI installed, and what can it do" without
//! hitting the external binary on every call. The cache is an explicit,
//! injectable object with its own clock so tests run concurrently with
//! synthetic time and never share state.

pub mod agents;
pub mod models;
pub mod plugins;

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::config::DroverConfig;
use crate::error::DiscoveryError;
use crate::exec::spawn::CommandRunner;
use crate::types::{ModelDiscoveryResult, ModelInfo, PluginInfo};

/// Time source for TTL decisions.
#[cfg_attr(test, mockall::automock)]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Default)]
struct ModelCacheState {
    result: Option<ModelDiscoveryResult>,
    /// Set when the last discovery attempt failed; cleared on success
    /// or reset. Gates retries behind the failure TTL.
    failed_at: Option<DateTime<Utc>>,
}

/// Process-wide capability state: CLI availability and model discovery.
///
/// Population is idempotent and last-write-wins, so concurrent callers
/// may race to populate without locking across the external invocation.
pub struct CapabilityCache {
    config: DroverConfig,
    runner: Arc<dyn CommandRunner>,
    clock: Arc<dyn Clock>,
    cli_available: Mutex<Option<bool>>,
    models: Mutex<ModelCacheState>,
}

impl CapabilityCache {
    pub fn new(config: DroverConfig, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            config,
            runner,
            clock: Arc::new(SystemClock),
            cli_available: Mutex::new(None),
            models: Mutex::new(ModelCacheState::default()),
        }
    }

    /// Substitute the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    // ========================================================================
    // CLI availability
    // ========================================================================

    /// Whether the agent CLI responds, probing and caching on first use.
    ///
    /// Probes an ordered sequence of variants and accepts the first
    /// success: the wrapper's help, the plugin-listing subcommand, and
    /// the underlying CLI's own help.
    pub async fn check_cli_available(&self) -> bool {
        if let Some(cached) = self.cli_cached() {
            return cached;
        }

        let probes: [(&str, &[&str]); 3] = [
            (&self.config.wrapper_binary, &["--help"]),
            (&self.config.agent_binary, &["plugin", "list"]),
            (&self.config.agent_binary, &["--help"]),
        ];

        let mut available = false;
        for (program, args) in probes {
            let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
            match self
                .runner
                .capture(program, &args, None, self.config.probe_timeout_ms)
                .await
            {
                Ok(output) if output.is_success() => {
                    debug!(program, "Agent CLI responded");
                    available = true;
                    break;
                }
                Ok(_) => {}
                Err(e) => debug!(program, error = %e, "CLI probe failed"),
            }
        }

        if !available {
            info!("Agent CLI not detected by any probe variant");
        }
        self.set_cli_available(available);
        available
    }

    fn cli_cached(&self) -> Option<bool> {
        *self.cli_available.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Whether the availability cache holds a value yet.
    pub fn cli_cache_populated(&self) -> bool {
        self.cli_cached().is_some()
    }

    /// Non-blocking availability read: optimistic `true` before the
    /// first probe resolves, so early callers are not held up.
    pub fn cli_available_hint(&self) -> bool {
        self.cli_cached().unwrap_or(true)
    }

    /// Overwrite the cached availability value.
    pub fn set_cli_available(&self, available: bool) {
        *self.cli_available.lock().unwrap_or_else(|e| e.into_inner()) = Some(available);
    }

    /// Clear the cached availability so the next check re-probes.
    pub fn reset_cli_cache(&self) {
        *self.cli_available.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    // ========================================================================
    // Model discovery
    // ========================================================================

    /// Models the agent CLI declares, cached under the success TTL.
    ///
    /// A failed discovery is also cached, under the shorter failure TTL,
    /// so transient errors neither retry hot nor wedge the full window.
    pub async fn discover_models(&self) -> Result<ModelDiscoveryResult, DiscoveryError> {
        let now = self.clock.now();
        {
            let state = self.models.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(result) = &state.result {
                let age = now.signed_duration_since(result.discovered_at);
                if age.num_seconds() >= 0
                    && (age.num_seconds() as u64) < self.config.discovery_success_ttl.as_secs()
                {
                    return Ok(result.clone());
                }
            }
            if let Some(failed_at) = state.failed_at {
                let age = now.signed_duration_since(failed_at);
                if age.num_seconds() >= 0
                    && (age.num_seconds() as u64) < self.config.discovery_failure_ttl.as_secs()
                {
                    return Err(DiscoveryError::InvocationFailed(
                        "model discovery recently failed; retry window not elapsed".to_string(),
                    ));
                }
            }
        }

        self.fetch_and_store_models().await
    }

    /// Re-discover unconditionally, bypassing both TTLs.
    pub async fn refresh_models(&self) -> Result<ModelDiscoveryResult, DiscoveryError> {
        self.fetch_and_store_models().await
    }

    /// Drop the cached discovery result and the failure marker.
    pub fn reset_models(&self) {
        *self.models.lock().unwrap_or_else(|e| e.into_inner()) = ModelCacheState::default();
    }

    async fn fetch_and_store_models(&self) -> Result<ModelDiscoveryResult, DiscoveryError> {
        let result = self.fetch_models().await;

        let mut state = self.models.lock().unwrap_or_else(|e| e.into_inner());
        match &result {
            Ok(discovered) => {
                state.result = Some(discovered.clone());
                state.failed_at = None;
            }
            Err(e) => {
                warn!(error = %e, "Model discovery failed");
                state.failed_at = Some(self.clock.now());
            }
        }
        result
    }

    async fn fetch_models(&self) -> Result<ModelDiscoveryResult, DiscoveryError> {
        let output = self
            .runner
            .capture(
                &self.config.agent_binary,
                &["--help".to_string()],
                None,
                self.config.probe_timeout_ms,
            )
            .await
            .map_err(|e| DiscoveryError::InvocationFailed(e.to_string()))?;

        if !output.is_success() {
            return Err(DiscoveryError::InvocationFailed(format!(
                "help invocation exited with {:?}",
                output.exit_code
            )));
        }

        let raw_choices = models::parse_model_choices(&output.stdout);
        if raw_choices.is_empty() {
            return Err(DiscoveryError::NoModelChoices);
        }

        let models = raw_choices
            .iter()
            .map(|choice| ModelInfo::classify(choice.as_str()))
            .collect();
        info!(count = raw_choices.len(), "Discovered agent models");

        Ok(ModelDiscoveryResult {
            models,
            raw_choices,
            discovered_at: self.clock.now(),
        })
    }

    // ========================================================================
    // Plugins
    // ========================================================================

    /// Installed plugins, queried fresh on every call.
    pub async fn list_plugins(&self) -> Result<Vec<PluginInfo>, DiscoveryError> {
        let output = self
            .runner
            .capture(
                &self.config.agent_binary,
                &["plugin".to_string(), "list".to_string()],
                None,
                self.config.probe_timeout_ms,
            )
            .await
            .map_err(|e| DiscoveryError::InvocationFailed(e.to_string()))?;

        if !output.is_success() {
            return Err(DiscoveryError::InvocationFailed(format!(
                "plugin list exited with {:?}",
                output.exit_code
            )));
        }

        Ok(plugins::parse_plugin_list(&output.stdout))
    }
}
