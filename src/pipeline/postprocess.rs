//! Post-processing: deterministic cleanup of the model's JSON answer.
//!
//! Prompts ask for bare JSON, but vision models still wrap it in a
//! ```` ```json ```` fence, prefix a BOM, or sprinkle zero-width spaces
//! copied from their training data. These rules undo exactly that and nothing
//! more; whatever still fails to parse afterwards is a genuinely malformed
//! answer and takes the fallback path in [`crate::pipeline::llm`].
//!
//! ## Rule Order
//!
//! Invisible characters go first so a BOM cannot hide the opening fence.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply every cleanup rule to a raw model answer.
///
/// 1. Strip invisible Unicode (BOM, zero-width spaces and joiners, word joiner)
/// 2. Strip one outer markdown fence (with or without a `json` tag)
/// 3. Trim surrounding whitespace
pub fn clean_model_json(input: &str) -> String {
    let s = remove_invisible_chars(input);
    let s = strip_json_fence(&s);
    s.trim().to_string()
}

// ── Rule 1: Strip invisible Unicode ──────────────────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input
        .chars()
        .filter(|c| !matches!(c, '\u{FEFF}' | '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}'))
        .collect()
}

// ── Rule 2: Strip outer fence ────────────────────────────────────────────────

static RE_OUTER_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^```[ \t]*(?:json|JSON)?[ \t]*\r?\n(.*?)\r?\n?```\s*$")
        .expect("static regex is valid")
});

fn strip_json_fence(input: &str) -> String {
    match RE_OUTER_FENCE.captures(input.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}
