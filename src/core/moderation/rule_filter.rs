// Rule-based filter - the fast, local first stage of moderation.
//
// Everything here is synchronous and allocation-light so the pipeline can run
// it on every submission before deciding whether a remote call is needed.

use super::moderation_models::{ModerationProvider, ModerationResult, RuleDetails};
use regex::Regex;
use std::sync::LazyLock;

/// Terms that flag a message when they appear anywhere in it (case-insensitive).
const BLOCKED_TERMS: &[&str] = &[
    "spam", "scam", "hate", "abuse", "threat", "violence", "die", "stupid", "idiot", "moron",
    "loser", "ugly", "fat", "racist",
];

/// Messages longer than this many characters are flagged.
const MAX_MESSAGE_CHARS: usize = 2000;
/// A single character repeated this many times counts as suspicious.
const SUSPICIOUS_CHAR_RUN: usize = 6;
/// A single character repeated this many times counts as spam.
const SPAM_CHAR_RUN: usize = 9;
/// A 1-3 character chunk repeated this many times in a row counts as suspicious.
const CHUNK_REPEATS: usize = 5;
const MAX_CHUNK_LEN: usize = 3;

static UPPERCASE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Z]{15,}").expect("valid regex"));

// ASCII word boundaries so "ab1234567890" is not treated as a bare number.
static LONG_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?-u:\b)[0-9]{10,}(?-u:\b)").expect("valid regex"));

/// Evaluate `text` against every rule. Never fails.
///
/// All checks run even after one fires so the returned `details` always
/// shows the full picture.
pub fn evaluate(text: &str) -> ModerationResult {
    let chars: Vec<char> = text.chars().collect();
    let longest_run = longest_char_run(&chars);

    let details = RuleDetails {
        bad_words: contains_blocked_term(text),
        suspicious: is_suspicious(text, &chars, longest_run),
        too_long: chars.len() > MAX_MESSAGE_CHARS,
        spam: longest_run >= SPAM_CHAR_RUN,
    };

    let result = if details.any() {
        ModerationResult::flagged(
            ModerationProvider::RuleFilter,
            "Content flagged by automated rules",
        )
    } else {
        ModerationResult::clean(ModerationProvider::RuleFilter, "Clean")
    };

    result.with_details(details)
}

fn contains_blocked_term(text: &str) -> bool {
    let lower = text.to_lowercase();
    BLOCKED_TERMS.iter().any(|term| lower.contains(term))
}

fn is_suspicious(text: &str, chars: &[char], longest_run: usize) -> bool {
    longest_run >= SUSPICIOUS_CHAR_RUN
        || UPPERCASE_RUN.is_match(text)
        || LONG_NUMBER.is_match(text)
        || has_repeated_chunk(chars)
}

/// Line terminators never take part in repetition checks.
fn is_line_terminator(c: char) -> bool {
    matches!(c, '\n' | '\r' | '\u{2028}' | '\u{2029}')
}

/// Length of the longest run of one repeated (non line-terminator) character.
fn longest_char_run(chars: &[char]) -> usize {
    let mut longest = 0;
    let mut current = 0;
    let mut previous: Option<char> = None;

    for &c in chars {
        if is_line_terminator(c) {
            current = 0;
            previous = None;
            continue;
        }

        if previous == Some(c) {
            current += 1;
        } else {
            current = 1;
            previous = Some(c);
        }
        longest = longest.max(current);
    }

    longest
}

/// Whether some chunk of 1-3 characters appears `CHUNK_REPEATS` times back to back.
fn has_repeated_chunk(chars: &[char]) -> bool {
    for start in 0..chars.len() {
        for len in 1..=MAX_CHUNK_LEN {
            let end = start + len * CHUNK_REPEATS;
            if end > chars.len() {
                break;
            }

            let chunk = &chars[start..start + len];
            if chunk.iter().any(|&c| is_line_terminator(c)) {
                continue;
            }

            let repeats = (1..CHUNK_REPEATS)
                .all(|i| &chars[start + i * len..start + (i + 1) * len] == chunk);
            if repeats {
                return true;
            }
        }
    }

    false
}
