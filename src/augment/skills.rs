// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Skill discovery.
//!
//! Skills are declared as `SKILL.md` files, one directory per skill,
//! under the repository's conventional skill roots. The front matter
//! carries the name and the one-line description fed to the
//! augmentation prompt.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::discovery::agents::parse_front_matter;
use crate::types::SkillInfo;

fn skill_roots(repo_root: &Path) -> [PathBuf; 2] {
    [
        repo_root.join(".copilot").join("skills"),
        repo_root.join(".github").join("skills"),
    ]
}

/// Scan the conventional skill roots for `SKILL.md` definitions.
///
/// Best-effort: missing roots and unreadable files are skipped.
pub fn discover_skills(repo_root: &Path) -> Vec<SkillInfo> {
    let mut skills = Vec::new();

    for root in skill_roots(repo_root) {
        let entries = match std::fs::read_dir(&root) {
            Ok(entries) => entries,
            Err(_) => continue,
        };
        for entry in entries.flatten() {
            let dir = entry.path();
            if !dir.is_dir() {
                continue;
            }
            let path = dir.join("SKILL.md");
            if let Some(skill) = read_skill(&path) {
                debug!(name = %skill.name, "Found skill definition");
                skills.push(skill);
            }
        }
    }

    skills
}

fn read_skill(path: &Path) -> Option<SkillInfo> {
    let content = std::fs::read_to_string(path).ok()?;
    let front = parse_front_matter(&content);

    let name = front
        .name
        .filter(|n| !n.trim().is_empty())
        .or_else(|| {
            // Fallback: the skill's directory name.
            path.parent()?
                .file_name()
                .and_then(|n| n.to_str())
                .map(str::to_string)
        })?;

    Some(SkillInfo {
        name,
        description: front.description.unwrap_or_default(),
        path: path.to_path_buf(),
    })
}
