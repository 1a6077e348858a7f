// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Plugin-list output parsing.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::PluginInfo;

static PLUGIN_LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<name>\S+)(?:\s+\(source:\s*(?P<source>[^)]+)\))?$")
        .expect("valid plugin line regex")
});

/// Parse `plugin list` output into plugin entries.
///
/// Accepts `name (source: locator)` and bare `name` lines. The
/// canonical "no plugins installed" message yields an empty list.
pub fn parse_plugin_list(output: &str) -> Vec<PluginInfo> {
    if output.to_lowercase().contains("no plugins installed") {
        return Vec::new();
    }

    output
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() {
                return None;
            }
            let caps = PLUGIN_LINE_RE.captures(line)?;
            Some(PluginInfo {
                name: caps["name"].to_string(),
                source: caps.name("source").map(|m| m.as_str().trim().to_string()),
            })
        })
        .collect()
}
