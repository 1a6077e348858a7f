// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Error types for the drover delegation subsystem.
//!
//! This module provides strongly-typed errors for different parts of the
//! crate, using `thiserror` for ergonomic error definitions and `anyhow`
//! for error propagation.

use thiserror::Error;

/// Errors that can occur while building an agent invocation.
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Task text is empty")]
    EmptyTask,

    #[error("No usable working directory: {0}")]
    NoWorkingDirectory(String),
}

/// Rejection reasons from the URL sanitizer.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SanitizeError {
    #[error("URL is empty or whitespace-only")]
    Empty,

    #[error("URL contains control characters")]
    ControlCharacters,

    #[error("URL contains shell metacharacters: {0}")]
    ShellMetacharacters(String),

    #[error("URL starts with '-' (flag injection)")]
    LeadingDash,

    #[error("URL failed to parse: {0}")]
    ParseFailure(String),

    #[error("URL scheme not allowed: {0}")]
    SchemeNotAllowed(String),

    #[error("URL carries embedded credentials")]
    EmbeddedCredentials,
}

/// Errors that can occur while supervising an agent process.
#[derive(Error, Debug)]
pub enum ExecError {
    #[error("Failed to spawn agent process: {0}")]
    SpawnFailed(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Agent process timed out after {0}ms")]
    Timeout(u64),
}

impl From<std::io::Error> for ExecError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::SpawnFailed(err.to_string()),
            _ => Self::IoError(err.to_string()),
        }
    }
}

/// Errors that can occur during capability discovery.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Agent CLI invocation failed: {0}")]
    InvocationFailed(String),

    #[error("No model choices found in help output")]
    NoModelChoices,

    #[error("IO error: {0}")]
    IoError(String),
}

impl From<std::io::Error> for DiscoveryError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError(err.to_string())
    }
}

/// Errors that can occur during instruction augmentation.
#[derive(Error, Debug)]
pub enum AugmentError {
    #[error("Agent invocation failed: {0}")]
    InvocationFailed(String),

    #[error("No JSON array found in agent output")]
    NoJsonArray,

    #[error("IO error: {0}")]
    IoError(String),
}

impl From<std::io::Error> for AugmentError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError(err.to_string())
    }
}

/// Result type alias using anyhow for flexible error handling.
pub type Result<T> = anyhow::Result<T>;
