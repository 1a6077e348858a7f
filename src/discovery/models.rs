// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Model-choice extraction from the agent CLI's help text.
//!
//! The CLI declares its supported models as a comma-separated quoted
//! list in the `--model` flag description. Help formatting wraps long
//! choice lists across indented continuation lines, so extraction
//! collects the whole flag block before pulling out the quoted strings.

use once_cell::sync::Lazy;
use regex::Regex;

static QUOTED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""([^"]+)""#).expect("valid quoted-string regex"));

/// Extract the declared model choices from help text.
///
/// Returns the raw choice strings in declaration order, or an empty
/// vector when no `--model` flag with a choice list is present.
pub fn parse_model_choices(help: &str) -> Vec<String> {
    let block = model_flag_block(help);
    QUOTED_RE
        .captures_iter(&block)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// The `--model` line plus its indented continuation lines, up to the
/// next flag description.
fn model_flag_block(help: &str) -> String {
    let mut block = String::new();
    let mut in_block = false;

    for line in help.lines() {
        let trimmed = line.trim_start();
        if in_block {
            // A new flag description ends the block.
            if trimmed.starts_with('-') || trimmed.is_empty() {
                break;
            }
            block.push('\n');
            block.push_str(line);
        } else if trimmed.starts_with("--model") {
            in_block = true;
            block.push_str(line);
        }
    }

    block
}
