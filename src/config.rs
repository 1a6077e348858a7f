// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Runtime configuration for the delegation subsystem.
//!
//! Values come from defaults, then `DROVER_*` environment variables.
//! The discovery TTLs are deliberately configuration, not constants: the
//! right values are a product decision and differ between deployments.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default success TTL for model discovery (30 minutes).
const DEFAULT_DISCOVERY_SUCCESS_TTL: Duration = Duration::from_secs(30 * 60);

/// Default failure TTL for model discovery (30 seconds).
const DEFAULT_DISCOVERY_FAILURE_TTL: Duration = Duration::from_secs(30);

/// Default timeout for the one-shot augmentation call (60 seconds).
const DEFAULT_AUGMENT_TIMEOUT_MS: u64 = 60_000;

/// Default timeout for capability-probe invocations (10 seconds).
const DEFAULT_PROBE_TIMEOUT_MS: u64 = 10_000;

/// Environment variable prefix owned by this crate. Stripped from the
/// child process environment so host configuration does not leak in.
pub const ENV_PREFIX: &str = "DROVER_";

/// Configuration for agent invocation and discovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DroverConfig {
    /// Agent CLI binary, e.g. `copilot`.
    pub agent_binary: String,

    /// Higher-level wrapper binary probed first for CLI presence.
    pub wrapper_binary: String,

    /// Directory for job-scoped agent logs and session-share files.
    /// Relative paths resolve against the run's working directory.
    pub log_root: PathBuf,

    /// Agent configuration directory passed through when set.
    pub config_dir: Option<PathBuf>,

    /// TTL for a successful model discovery.
    pub discovery_success_ttl: Duration,

    /// TTL for a failed model discovery. Kept shorter than the success
    /// TTL so a transient failure neither retries hot nor wedges.
    pub discovery_failure_ttl: Duration,

    /// Timeout for the one-shot augmentation invocation.
    pub augment_timeout_ms: u64,

    /// Timeout for capability probes (help text, plugin list).
    pub probe_timeout_ms: u64,
}

impl Default for DroverConfig {
    fn default() -> Self {
        Self {
            agent_binary: "copilot".to_string(),
            wrapper_binary: "gh-copilot".to_string(),
            log_root: PathBuf::from(".drover/logs"),
            config_dir: None,
            discovery_success_ttl: DEFAULT_DISCOVERY_SUCCESS_TTL,
            discovery_failure_ttl: DEFAULT_DISCOVERY_FAILURE_TTL,
            augment_timeout_ms: DEFAULT_AUGMENT_TIMEOUT_MS,
            probe_timeout_ms: DEFAULT_PROBE_TIMEOUT_MS,
        }
    }
}

impl DroverConfig {
    /// Load defaults, then apply `DROVER_*` environment overrides.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(binary) = std::env::var("DROVER_AGENT_BINARY") {
            if !binary.trim().is_empty() {
                config.agent_binary = binary;
            }
        }
        if let Ok(wrapper) = std::env::var("DROVER_WRAPPER_BINARY") {
            if !wrapper.trim().is_empty() {
                config.wrapper_binary = wrapper;
            }
        }
        if let Ok(root) = std::env::var("DROVER_LOG_ROOT") {
            if !root.trim().is_empty() {
                config.log_root = PathBuf::from(root);
            }
        }
        if let Ok(dir) = std::env::var("DROVER_CONFIG_DIR") {
            if !dir.trim().is_empty() {
                config.config_dir = Some(PathBuf::from(dir));
            }
        }
        if let Some(secs) = env_u64("DROVER_DISCOVERY_SUCCESS_TTL_SECS") {
            config.discovery_success_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = env_u64("DROVER_DISCOVERY_FAILURE_TTL_SECS") {
            config.discovery_failure_ttl = Duration::from_secs(secs);
        }
        if let Some(ms) = env_u64("DROVER_AUGMENT_TIMEOUT_MS") {
            config.augment_timeout_ms = ms;
        }
        if let Some(ms) = env_u64("DROVER_PROBE_TIMEOUT_MS") {
            config.probe_timeout_ms = ms;
        }

        config
    }
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DroverConfig::default();
        assert_eq!(config.agent_binary, "copilot");
        assert_eq!(config.discovery_success_ttl, Duration::from_secs(1800));
        assert_eq!(config.discovery_failure_ttl, Duration::from_secs(30));
        assert!(config.discovery_failure_ttl < config.discovery_success_ttl);
        assert_eq!(config.augment_timeout_ms, 60_000);
    }

    #[test]
    fn test_env_u64_parse() {
        assert_eq!(env_u64("DROVER_TEST_UNSET_VAR_XYZ"), None);
    }
}
