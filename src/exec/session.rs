// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Session identifier extraction.
//!
//! The agent reports its session ID in several places of varying
//! reliability: the live output, the session-share file, and the name of
//! the newest log file. Sources are modeled as an ordered list of
//! extractor strategies combined first-success-wins, so adding or
//! removing a source never touches control flow.

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

static SESSION_LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:session id|starting session|session)[:\s]+(?P<id>[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12})",
    )
    .expect("valid session line regex")
});

static UUID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$")
        .expect("valid uuid regex")
});

/// Set-once capture of a session ID from live output.
///
/// The first labeled match wins; later matches in the same run never
/// overwrite it. A resume ID supplied at start is the floor default.
#[derive(Debug, Default)]
pub struct SessionCapture {
    captured: Option<String>,
    floor: Option<String>,
}

impl SessionCapture {
    pub fn new(resume_session: Option<String>) -> Self {
        Self {
            captured: None,
            floor: resume_session,
        }
    }

    /// Observe one output line.
    pub fn feed_line(&mut self, line: &str) {
        if self.captured.is_some() {
            return;
        }
        if let Some(caps) = SESSION_LINE_RE.captures(line) {
            self.captured = Some(caps["id"].to_string());
        }
    }

    /// The best-known session ID: captured, else the resume floor.
    pub fn current(&self) -> Option<&str> {
        self.captured.as_deref().or(self.floor.as_deref())
    }

    pub fn into_current(self) -> Option<String> {
        self.captured.or(self.floor)
    }
}

/// Parse a session-share file (`{"session_id": "..."}`).
fn from_share_file(log_dir: &Path) -> Option<String> {
    let raw = std::fs::read_to_string(log_dir.join("session.json")).ok()?;
    let value: serde_json::Value = serde_json::from_str(&raw).ok()?;
    value
        .get("session_id")
        .and_then(|v| v.as_str())
        .filter(|s| UUID_RE.is_match(&s.to_lowercase()))
        .map(|s| s.to_string())
}

/// The newest `.log` file whose stem is a UUID.
fn from_newest_log(log_dir: &Path) -> Option<String> {
    let entries = std::fs::read_dir(log_dir).ok()?;
    let mut candidates: Vec<(std::time::SystemTime, String)> = entries
        .flatten()
        .filter_map(|entry| {
            let path = entry.path();
            if path.extension()?.to_str()? != "log" {
                return None;
            }
            let stem = path.file_stem()?.to_str()?.to_lowercase();
            if !UUID_RE.is_match(&stem) {
                return None;
            }
            let modified = entry.metadata().ok()?.modified().ok()?;
            Some((modified, stem))
        })
        .collect();
    candidates.sort_by(|a, b| b.0.cmp(&a.0));
    candidates.into_iter().next().map(|(_, stem)| stem)
}

/// Resolve the session ID after a run, first success wins.
///
/// Order: live-output capture, session-share file, newest log filename.
pub fn resolve_session_id(capture: SessionCapture, log_dir: &Path) -> Option<String> {
    let live = capture.into_current();
    let extractors: [Box<dyn Fn() -> Option<String> + '_>; 3] = [
        Box::new(move || live.clone()),
        Box::new(|| from_share_file(log_dir)),
        Box::new(|| from_newest_log(log_dir)),
    ];
    extractors.iter().find_map(|extract| extract())
}
