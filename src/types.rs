// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Core types for the drover delegation subsystem.
//!
//! This module defines the data structures exchanged with the caller:
//! run requests/results, usage metrics recovered from agent output, and
//! the capability-discovery records.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Run Request / Result
// ============================================================================

/// A single delegation request: one job node, one agent process, one
/// working directory.
///
/// Immutable once constructed; use [`RunRequest::new`] plus the `with_*`
/// builder methods.
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// Working directory for the agent process. Must exist.
    pub cwd: PathBuf,

    /// Task text handed to the agent.
    pub task: String,

    /// Job node identifier, used to scope the instructions file and logs.
    pub job_id: String,

    /// Session identifier to resume, if continuing a prior conversation.
    pub resume_session: Option<String>,

    /// Model identifier to request from the agent.
    pub model: Option<String>,

    /// Additional directories the agent may access. Entries must be
    /// absolute, existing paths; others are dropped at build time.
    pub allowed_folders: Vec<PathBuf>,

    /// URLs the agent may reach. Empty means no network access.
    pub allowed_urls: Vec<String>,

    /// Maximum number of agent turns, if bounded.
    pub max_turns: Option<u32>,

    /// Timeout in milliseconds. Zero means unbounded.
    pub timeout_ms: u64,

    /// Skip writing the per-job instructions file (single-turn calls).
    pub skip_instructions_file: bool,
}

impl RunRequest {
    /// Create a request with required fields and defaults elsewhere.
    pub fn new(cwd: impl Into<PathBuf>, task: impl Into<String>) -> Self {
        Self {
            cwd: cwd.into(),
            task: task.into(),
            job_id: uuid::Uuid::new_v4().to_string(),
            resume_session: None,
            model: None,
            allowed_folders: Vec::new(),
            allowed_urls: Vec::new(),
            max_turns: None,
            timeout_ms: 0,
            skip_instructions_file: false,
        }
    }

    /// Set the job node identifier.
    pub fn with_job_id(mut self, id: impl Into<String>) -> Self {
        self.job_id = id.into();
        self
    }

    /// Resume a prior session.
    pub fn with_resume_session(mut self, session: impl Into<String>) -> Self {
        self.resume_session = Some(session.into());
        self
    }

    /// Request a specific model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Grant access to additional directories.
    pub fn with_allowed_folders(mut self, folders: Vec<PathBuf>) -> Self {
        self.allowed_folders = folders;
        self
    }

    /// Grant access to specific URLs.
    pub fn with_allowed_urls(mut self, urls: Vec<String>) -> Self {
        self.allowed_urls = urls;
        self
    }

    /// Bound the number of agent turns.
    pub fn with_max_turns(mut self, turns: u32) -> Self {
        self.max_turns = Some(turns);
        self
    }

    /// Set the run timeout in milliseconds. Zero means unbounded.
    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = ms;
        self
    }

    /// Skip the instructions file for this run.
    pub fn without_instructions_file(mut self) -> Self {
        self.skip_instructions_file = true;
        self
    }
}

/// Outcome of one delegation run. Produced exactly once per `run()` call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunResult {
    /// Whether the run is considered successful.
    pub success: bool,

    /// Session identifier captured from the agent, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    /// Human-readable failure description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Process exit code, where one was observed or normalized.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,

    /// Usage metrics recovered from the agent's output, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<UsageMetrics>,
}

impl RunResult {
    /// A successful result with an exit code.
    pub fn success(exit_code: i32) -> Self {
        Self {
            success: true,
            exit_code: Some(exit_code),
            ..Default::default()
        }
    }

    /// A failed result with a human-readable reason.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

// ============================================================================
// Usage Metrics
// ============================================================================

/// Aggregate token usage, either reported directly or derived from the
/// per-model breakdown.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Label for the aggregate, typically the first breakdown model name.
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cached_tokens: u64,
}

/// One entry of the "breakdown by model" table in the agent's summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelUsage {
    /// Model name, possibly vendor-prefixed (e.g. `openai/gpt-4.1`).
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cached_tokens: u64,
    /// Estimated premium requests attributed to this model.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub premium_requests: Option<f64>,
}

/// Telemetry recovered from an agent run.
///
/// Fields are populated incrementally and independently; absence of one
/// does not imply absence of the others.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageMetrics {
    /// Wall duration in milliseconds. Not self-measured; defaults to 0
    /// unless supplied by the caller.
    pub duration_ms: u64,

    /// Estimated premium requests. May be fractional.
    pub premium_requests: f64,

    /// Time spent in API calls, seconds.
    pub api_time_secs: f64,

    /// Total session time, seconds.
    pub session_time_secs: f64,

    /// Lines of code added.
    pub lines_added: u64,

    /// Lines of code removed.
    pub lines_removed: u64,

    /// Ordered per-model breakdown, as reported.
    pub by_model: Vec<ModelUsage>,

    /// Aggregate token usage. Derived from `by_model` when not reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens: Option<TokenUsage>,
}

impl UsageMetrics {
    /// Derive the aggregate token record from the breakdown when missing.
    ///
    /// The first breakdown entry's model name labels the aggregate.
    pub fn fill_aggregate(&mut self) {
        if self.tokens.is_some() || self.by_model.is_empty() {
            return;
        }
        let mut total = TokenUsage {
            model: self.by_model[0].model.clone(),
            ..Default::default()
        };
        for entry in &self.by_model {
            total.input_tokens += entry.input_tokens;
            total.output_tokens += entry.output_tokens;
            total.cached_tokens += entry.cached_tokens;
        }
        self.tokens = Some(total);
    }
}

// ============================================================================
// Capability Discovery
// ============================================================================

/// Vendor classification for a discovered model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelVendor {
    Anthropic,
    Openai,
    Google,
    Unknown,
}

/// Rough capability tier for a discovered model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    Fast,
    Standard,
    Premium,
}

/// A model the agent CLI declares support for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub vendor: ModelVendor,
    pub family: String,
    pub tier: ModelTier,
}

impl ModelInfo {
    /// Classify a raw model identifier into vendor, family, and tier.
    pub fn classify(id: impl Into<String>) -> Self {
        let id = id.into();
        let lower = id.to_lowercase();
        // Strip a vendor-prefix slash for classification purposes.
        let name = lower.rsplit('/').next().unwrap_or(&lower).to_string();

        let vendor = if name.contains("claude") {
            ModelVendor::Anthropic
        } else if name.contains("gpt")
            || name.contains("codex")
            || name.starts_with("o1")
            || name.starts_with("o3")
            || name.starts_with("o4")
        {
            ModelVendor::Openai
        } else if name.contains("gemini") {
            ModelVendor::Google
        } else {
            ModelVendor::Unknown
        };

        let family = name
            .split(|c: char| c == '-' || c == '.')
            .next()
            .unwrap_or(&name)
            .to_string();

        let tier = if name.contains("mini") || name.contains("haiku") {
            ModelTier::Fast
        } else if name.contains("opus") || name.contains("max") {
            ModelTier::Premium
        } else {
            ModelTier::Standard
        };

        Self {
            id,
            vendor,
            family,
            tier,
        }
    }
}

/// Result of discovering the agent CLI's model choices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDiscoveryResult {
    /// Classified models.
    pub models: Vec<ModelInfo>,
    /// Raw choice strings exactly as discovered.
    pub raw_choices: Vec<String>,
    /// When discovery ran.
    pub discovered_at: DateTime<Utc>,
}

/// An installed agent plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginInfo {
    pub name: String,
    /// Source locator, e.g. `owner/repo` or `name@registry`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// A custom agent definition found on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomAgent {
    /// Declared name from front matter, or the filename stem.
    pub name: String,
    /// Definition file location.
    pub path: PathBuf,
}

// ============================================================================
// Instruction Augmentation
// ============================================================================

/// A job node whose instructions may be rewritten before execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AugmentableNode {
    pub id: String,
    pub instructions: String,
    /// Snapshot of the pre-augmentation instructions, taken exactly once.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_instructions: Option<String>,
    /// Node opted out of augmentation.
    #[serde(default)]
    pub skip_augmentation: bool,
}

impl AugmentableNode {
    pub fn new(id: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            instructions: instructions.into(),
            original_instructions: None,
            skip_augmentation: false,
        }
    }

    /// Apply rewritten instructions, preserving the first original snapshot.
    pub fn apply_augmentation(&mut self, instructions: impl Into<String>) {
        if self.original_instructions.is_none() {
            self.original_instructions = Some(self.instructions.clone());
        }
        self.instructions = instructions.into();
    }
}

/// A locally declared skill, surfaced to the augmentation prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillInfo {
    pub name: String,
    pub description: String,
    pub path: PathBuf,
}

/// Captured output from a one-shot agent invocation.
#[derive(Debug, Clone, Default)]
pub struct CapturedOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

impl CapturedOutput {
    pub fn is_success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Check that a path is absolute and exists on disk.
pub fn is_valid_access_dir(path: &Path) -> bool {
    path.is_absolute() && path.exists()
}
