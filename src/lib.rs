// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Drover - delegate job nodes to an external CLI coding agent.
//!
//! Drover wraps an AI coding agent's command-line interface: it builds
//! injection-resistant invocations, supervises the child process,
//! recovers usage telemetry and session identifiers from its output,
//! discovers what the installed CLI can do, and optionally rewrites node
//! instructions in a single constrained agent call before execution.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - [`types`] - Core type definitions (RunRequest, RunResult, UsageMetrics, etc.)
//! - [`error`] - Error types and result aliases
//! - [`config`] - Runtime configuration with environment overrides
//! - [`command`] - Invocation building and URL sanitization
//! - [`exec`] - Process lifecycle supervision, spawn primitive, session capture
//! - [`stats`] - Output stream interpretation into usage metrics
//! - [`discovery`] - CLI/model/plugin/agent capability discovery with TTL caching
//! - [`augment`] - Single-turn instruction augmentation with skill context
//! - [`git`] - Stage-and-commit bookkeeping for run records
//! - [`telemetry`] - Tracing and metrics infrastructure
//!
//! # Example
//!
//! ```rust,ignore
//! use drover::config::DroverConfig;
//! use drover::exec::AgentRunner;
//! use drover::types::RunRequest;
//!
//! let runner = AgentRunner::new(DroverConfig::from_env());
//! let request = RunRequest::new("/path/to/repo", "fix the failing test");
//! let result = runner.run(&request).await;
//! ```

pub mod augment;
pub mod command;
pub mod config;
pub mod discovery;
pub mod error;
pub mod exec;
pub mod git;
pub mod stats;
pub mod telemetry;
pub mod types;

// Re-export commonly used types at crate root
pub use augment::{AugmentContext, Augmenter};
pub use command::{build_invocation, sanitize::sanitize_url, Invocation};
pub use config::DroverConfig;
pub use discovery::CapabilityCache;
pub use error::{AugmentError, CommandError, DiscoveryError, ExecError, Result, SanitizeError};
pub use exec::{
    spawn::{CommandRunner, TokioRunner},
    AgentRunner, OutputSource,
};
pub use stats::UsageScanner;
pub use types::{
    // Run types
    RunRequest, RunResult,
    // Usage types
    ModelUsage, TokenUsage, UsageMetrics,
    // Discovery types
    CustomAgent, ModelDiscoveryResult, ModelInfo, ModelTier, ModelVendor, PluginInfo,
    // Augmentation types
    AugmentableNode, SkillInfo,
};
