//! Homoglyph detection over decoded hostnames.
//!
//! Flags non-ASCII characters and the Unicode script blocks they come from.
//! Look-alike domains almost always mix Latin with one of a handful of
//! scripts whose glyphs shadow ASCII letters.

use std::collections::BTreeSet;

use serde::Serialize;
use unicode_script::UnicodeScript;

/// Script blocks whose glyphs commonly impersonate ASCII letters.
const SUSPICIOUS_BLOCKS: [&str; 5] = ["CYRILLIC", "GREEK", "ARMENIAN", "HEBREW", "ARABIC"];

/// Cap on distinct block names we report per host.
const MAX_BLOCKS: usize = 10;

#[derive(Debug, Clone, Default, Serialize)]
pub struct HomoglyphAssessment {
    /// Non-ASCII characters / host length, in [0,1]. Zero for an empty or
    /// pure-ASCII host.
    pub non_ascii_ratio: f64,
    pub non_ascii_chars: BTreeSet<char>,
    /// Up to 10 distinct block names, first-seen order.
    pub unicode_blocks: Vec<String>,
    pub block_flag: bool,
}

/// Assess a decoded host for homoglyph indicators. Never fails.
pub fn detect_homoglyphs(host: &str) -> HomoglyphAssessment {
    if host.is_empty() {
        return HomoglyphAssessment::default();
    }

    let len = host.chars().count();
    let non_ascii: Vec<char> = host.chars().filter(|c| (*c as u32) > 127).collect();
    let ratio = non_ascii.len() as f64 / len.max(1) as f64;

    let mut blocks: Vec<String> = Vec::new();
    for c in &non_ascii {
        let name = c.script().full_name().to_ascii_uppercase();
        if !blocks.contains(&name) {
            blocks.push(name);
            if blocks.len() == MAX_BLOCKS {
                break;
            }
        }
    }

    let block_flag = blocks
        .iter()
        .any(|b| SUSPICIOUS_BLOCKS.contains(&b.as_str()));

    HomoglyphAssessment {
        non_ascii_ratio: ratio,
        non_ascii_chars: non_ascii.into_iter().collect(),
        unicode_blocks: blocks,
        block_flag,
    }
}
