// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Instruction augmentation.
//!
//! A single-turn pre-processing pass: the agent is shown the locally
//! declared skills and each pending node's instructions, and asked to
//! return rewritten instructions as a JSON array of `{id, instructions}`
//! objects. The pass never recurses: the in-progress flag travels on
//! [`AugmentContext`], so a nested call sees it and returns immediately,
//! and it cannot leak because it is scoped to the call value rather than
//! held in process-wide state.

pub mod skills;

use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::DroverConfig;
use crate::error::AugmentError;
use crate::exec::spawn::CommandRunner;
use crate::types::{AugmentableNode, SkillInfo};

/// Per-call augmentation context.
#[derive(Debug, Clone)]
pub struct AugmentContext {
    /// Repository root, used for skill discovery and as the agent's
    /// working directory.
    pub repo_root: PathBuf,
    /// Set while an augmentation invocation is running. A call that
    /// observes it set is a nested call and skips itself.
    pub in_progress: bool,
}

impl AugmentContext {
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
            in_progress: false,
        }
    }
}

/// One rewritten-instructions entry from the agent's response.
#[derive(Debug, Deserialize)]
struct AugmentEntry {
    #[serde(default)]
    id: String,
    #[serde(default)]
    instructions: String,
}

/// Runs the augmentation pass against the agent CLI.
pub struct Augmenter {
    config: DroverConfig,
    runner: Arc<dyn CommandRunner>,
}

impl Augmenter {
    pub fn new(config: DroverConfig, runner: Arc<dyn CommandRunner>) -> Self {
        Self { config, runner }
    }

    /// Augment every pending node in place; returns how many applied.
    ///
    /// Nodes opted out via `skip_augmentation` are never sent or
    /// touched. A context already marked in-progress short-circuits to
    /// zero without invoking the agent.
    pub async fn augment_nodes(
        &self,
        nodes: &mut [AugmentableNode],
        ctx: &AugmentContext,
    ) -> Result<usize, AugmentError> {
        if ctx.in_progress {
            debug!("Augmentation already in progress; skipping nested pass");
            return Ok(0);
        }

        let pending: Vec<&AugmentableNode> =
            nodes.iter().filter(|n| !n.skip_augmentation).collect();
        if pending.is_empty() {
            return Ok(0);
        }

        let skills = skills::discover_skills(&ctx.repo_root);
        let prompt = build_prompt(&skills, &pending);

        let args = vec![
            "-p".to_string(),
            prompt,
            "--max-turns".to_string(),
            "1".to_string(),
        ];
        let output = self
            .runner
            .capture(
                &self.config.agent_binary,
                &args,
                Some(ctx.repo_root.as_path()),
                self.config.augment_timeout_ms,
            )
            .await
            .map_err(|e| AugmentError::InvocationFailed(e.to_string()))?;

        if !output.is_success() {
            return Err(AugmentError::InvocationFailed(format!(
                "augmentation invocation exited with {:?}",
                output.exit_code
            )));
        }

        let entries = extract_entries(&output.stdout).ok_or(AugmentError::NoJsonArray)?;
        Ok(apply_entries(nodes, entries))
    }
}

/// Prompt combining skill descriptions with the pending nodes.
fn build_prompt(skills: &[SkillInfo], pending: &[&AugmentableNode]) -> String {
    let mut prompt = String::from(
        "Rewrite the instructions for each task below to be precise and \
         actionable. Respond with ONLY a JSON array of objects of the form \
         {\"id\": \"...\", \"instructions\": \"...\"}, one per task, and no \
         other text.\n",
    );

    if !skills.is_empty() {
        prompt.push_str("\nAvailable skills:\n");
        for skill in skills {
            prompt.push_str(&format!("- {}: {}\n", skill.name, skill.description));
        }
    }

    prompt.push_str("\nTasks:\n");
    for node in pending {
        prompt.push_str(&format!("id: {}\ninstructions: {}\n\n", node.id, node.instructions));
    }

    prompt
}

/// Extract the first well-formed JSON array from noisy output.
///
/// The agent often wraps its answer in log lines or markdown fences, so
/// every `[` is tried as a candidate start and trailing text after the
/// array is tolerated.
fn extract_entries(output: &str) -> Option<Vec<AugmentEntry>> {
    for (index, _) in output.match_indices('[') {
        let candidate = &output[index..];
        let mut stream = serde_json::Deserializer::from_str(candidate)
            .into_iter::<Vec<AugmentEntry>>();
        if let Some(Ok(entries)) = stream.next() {
            return Some(entries);
        }
    }
    None
}

/// Apply validated entries to matching pending nodes.
fn apply_entries(nodes: &mut [AugmentableNode], entries: Vec<AugmentEntry>) -> usize {
    let mut applied = 0;
    for entry in entries {
        if entry.id.trim().is_empty() || entry.instructions.trim().is_empty() {
            warn!("Dropping augmentation entry with empty id or instructions");
            continue;
        }
        let target = nodes
            .iter_mut()
            .find(|n| !n.skip_augmentation && n.id == entry.id);
        match target {
            Some(node) => {
                node.apply_augmentation(entry.instructions);
                applied += 1;
            }
            None => debug!(id = %entry.id, "Augmentation entry matched no pending node"),
        }
    }
    info!(applied, "Applied augmentation entries");
    applied
}
