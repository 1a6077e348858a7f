// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Output stream interpreter.
//!
//! Incrementally parses the agent's free-text summary lines into
//! [`UsageMetrics`]. Matching is prefix-agnostic: timestamps, log-level
//! tags, and source tags ahead of the meaningful content are tolerated.
//! Each recognized shape is an independent matcher returning a typed
//! partial update; a fold applies the first match per line, so formats
//! stay individually testable and order-independent of prefix stripping.

pub mod units;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::{ModelUsage, UsageMetrics};

pub use units::{parse_duration_secs, parse_token_count};

static PREMIUM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)total usage est\.?:?\s*(?P<n>\d+(?:\.\d+)?)\s*premium request")
        .expect("valid premium regex")
});

static API_TIME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)api time(?:\s+spent)?:?\s*(?P<dur>\d[\dhms\. ]*)")
        .expect("valid api time regex")
});

static SESSION_TIME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:total\s+)?session time:?\s*(?P<dur>\d[\dhms\. ]*)")
        .expect("valid session time regex")
});

static CODE_CHANGES_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\+(?P<added>\d+)[^\d+−-]*[−-](?P<removed>\d+)")
        .expect("valid code changes regex")
});

static BREAKDOWN_HEADER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:breakdown|usage) by model").expect("valid breakdown header regex")
});

static BREAKDOWN_ENTRY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?x)
        (?P<model>[A-Za-z0-9][A-Za-z0-9._/-]*)\s+
        (?P<in>\d+(?:\.\d+)?\s*[kKmM]?)\s+in,\s*
        (?P<out>\d+(?:\.\d+)?\s*[kKmM]?)\s+out
        (?:,\s*(?P<cached>\d+(?:\.\d+)?\s*[kKmM]?)\s+cached)?
        (?:\s*\(Est\.\s*(?P<prem>\d+(?:\.\d+)?)\s*Premium\ requests?\))?",
    )
    .expect("valid breakdown entry regex")
});

/// One typed partial update produced by a matcher.
#[derive(Debug, Clone, PartialEq)]
enum Update {
    PremiumRequests(f64),
    ApiTime(f64),
    SessionTime(f64),
    CodeChanges { added: u64, removed: u64 },
    BreakdownHeader,
    BreakdownEntry(ModelUsage),
}

fn match_premium(line: &str) -> Option<Update> {
    let caps = PREMIUM_RE.captures(line)?;
    caps.name("n")?
        .as_str()
        .parse()
        .ok()
        .map(Update::PremiumRequests)
}

fn match_api_time(line: &str) -> Option<Update> {
    let caps = API_TIME_RE.captures(line)?;
    Some(Update::ApiTime(parse_duration_secs(
        caps.name("dur")?.as_str().trim(),
    )))
}

fn match_session_time(line: &str) -> Option<Update> {
    // "API time" also ends in "time"; give the API matcher precedence by
    // ordering, and skip here when the line names the API explicitly.
    if API_TIME_RE.is_match(line) {
        return None;
    }
    let caps = SESSION_TIME_RE.captures(line)?;
    Some(Update::SessionTime(parse_duration_secs(
        caps.name("dur")?.as_str().trim(),
    )))
}

fn match_code_changes(line: &str) -> Option<Update> {
    let caps = CODE_CHANGES_RE.captures(line)?;
    Some(Update::CodeChanges {
        added: caps.name("added")?.as_str().parse().ok()?,
        removed: caps.name("removed")?.as_str().parse().ok()?,
    })
}

fn match_breakdown_header(line: &str) -> Option<Update> {
    BREAKDOWN_HEADER_RE
        .is_match(line)
        .then_some(Update::BreakdownHeader)
}

fn match_breakdown_entry(line: &str) -> Option<Update> {
    let caps = BREAKDOWN_ENTRY_RE.captures(line)?;
    Some(Update::BreakdownEntry(ModelUsage {
        model: caps.name("model")?.as_str().to_string(),
        input_tokens: parse_token_count(caps.name("in")?.as_str())?,
        output_tokens: parse_token_count(caps.name("out")?.as_str())?,
        cached_tokens: caps
            .name("cached")
            .and_then(|m| parse_token_count(m.as_str()))
            .unwrap_or(0),
        premium_requests: caps.name("prem").and_then(|m| m.as_str().parse().ok()),
    }))
}

/// Incremental, line-oriented usage parser.
///
/// Feed lines from either stream in arrival order; call
/// [`UsageScanner::into_metrics`] once the run ends. `None` means no
/// recognized line was ever seen, which is distinct from metrics whose
/// fields are all zero.
#[derive(Debug, Default)]
pub struct UsageScanner {
    metrics: UsageMetrics,
    matched_any: bool,
    in_breakdown: bool,
}

impl UsageScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one output line.
    pub fn feed_line(&mut self, line: &str) {
        // Inside the breakdown sub-mode, entry lines accumulate until the
        // first non-matching line closes it.
        if self.in_breakdown {
            if let Some(Update::BreakdownEntry(entry)) = match_breakdown_entry(line) {
                self.apply(Update::BreakdownEntry(entry));
                return;
            }
            self.in_breakdown = false;
        }

        let matchers: &[fn(&str) -> Option<Update>] = &[
            match_premium,
            match_api_time,
            match_session_time,
            match_code_changes,
            match_breakdown_header,
        ];

        let update = matchers.iter().fold(None, |acc, m| acc.or_else(|| m(line)));
        if let Some(update) = update {
            self.apply(update);
        }
    }

    fn apply(&mut self, update: Update) {
        self.matched_any = true;
        match update {
            Update::PremiumRequests(n) => self.metrics.premium_requests = n,
            Update::ApiTime(secs) => self.metrics.api_time_secs = secs,
            Update::SessionTime(secs) => self.metrics.session_time_secs = secs,
            Update::CodeChanges { added, removed } => {
                self.metrics.lines_added = added;
                self.metrics.lines_removed = removed;
            }
            Update::BreakdownHeader => self.in_breakdown = true,
            Update::BreakdownEntry(entry) => {
                // Replace an existing entry for the same model so repeated
                // lines never double-count.
                if let Some(existing) = self
                    .metrics
                    .by_model
                    .iter_mut()
                    .find(|e| e.model == entry.model)
                {
                    *existing = entry;
                } else {
                    self.metrics.by_model.push(entry);
                }
            }
        }
    }

    /// Whether any recognized line has been fed.
    pub fn has_metrics(&self) -> bool {
        self.matched_any
    }

    /// Finish scanning. Returns `None` when no recognized line was seen.
    pub fn into_metrics(self) -> Option<UsageMetrics> {
        if !self.matched_any {
            return None;
        }
        let mut metrics = self.metrics;
        metrics.fill_aggregate();
        Some(metrics)
    }
}
