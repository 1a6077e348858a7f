// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Custom agent discovery.
//!
//! Agent definitions are markdown files with optional YAML front matter
//! in a small set of conventional directories. Scanning is best-effort:
//! unreadable directories or files degrade to an empty or partial result.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::types::CustomAgent;

/// Front-matter fields shared by agent and skill definition files.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct FrontMatter {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Parse the leading `---` fenced YAML block of a definition file.
///
/// Returns the default (all-`None`) front matter when the fence is
/// absent or the YAML does not parse; discovery prefers a filename
/// fallback over a hard failure.
pub(crate) fn parse_front_matter(content: &str) -> FrontMatter {
    let mut lines = content.lines();
    if lines.next().map(str::trim) != Some("---") {
        return FrontMatter::default();
    }
    let block: Vec<&str> = lines.take_while(|line| line.trim() != "---").collect();
    serde_yaml::from_str(&block.join("\n")).unwrap_or_default()
}

/// Conventional agent-definition directories, user level then repo level.
fn agent_dirs(repo_root: &Path) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Some(home) = dirs::home_dir() {
        dirs.push(home.join(".copilot").join("agents"));
    }
    dirs.push(repo_root.join(".copilot").join("agents"));
    dirs.push(repo_root.join(".github").join("agents"));
    dirs
}

/// Scan the conventional directories for custom agent definitions.
pub fn discover_custom_agents(repo_root: &Path) -> Vec<CustomAgent> {
    let mut agents = Vec::new();
    for dir in agent_dirs(repo_root) {
        scan_agent_dir(&dir, &mut agents);
    }
    agents
}

fn scan_agent_dir(dir: &Path, agents: &mut Vec<CustomAgent>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return,
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("md") {
            continue;
        }
        let name = agent_name(&path);
        debug!(name, path = %path.display(), "Found custom agent definition");
        agents.push(CustomAgent { name, path });
    }
}

/// Declared front-matter name, or the filename stem.
fn agent_name(path: &Path) -> String {
    let declared = std::fs::read_to_string(path)
        .ok()
        .and_then(|content| parse_front_matter(&content).name)
        .filter(|name| !name.trim().is_empty());

    declared.unwrap_or_else(|| {
        path.file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unnamed")
            .to_string()
    })
}
