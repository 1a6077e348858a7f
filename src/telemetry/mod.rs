// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Telemetry and metrics infrastructure.
//!
//! Initialize once at startup:
//!
//! ```rust,ignore
//! use drover::telemetry::{init_telemetry, TelemetryConfig};
//!
//! let _guard = init_telemetry(&TelemetryConfig::default())?;
//! ```
//!
//! Run-level counters live behind the `telemetry` cargo feature; with
//! the feature off, recording sites compile away entirely.

mod init;
pub mod metrics;

pub use init::{init_telemetry, TelemetryConfig, TelemetryGuard};
pub use metrics::{Metrics, OperationMetrics, GLOBAL_METRICS};
