//! Weighted story similarity.
//!
//! Body content is the strongest duplicate signal; customer name catches
//! republished content with edited prose; titles are rewritten by editors
//! independently of content, so they carry the least weight.

use similar::TextDiff;
use storymill_common::{text, StoryRecord};

pub const NAME_WEIGHT: f64 = 0.30;
pub const BODY_WEIGHT: f64 = 0.50;
pub const TITLE_WEIGHT: f64 = 0.20;

/// Bodies are compared over a bounded prefix — duplicate pages agree in
/// their opening prose, and full-page diffs are quadratic.
const BODY_COMPARE_CHARS: usize = 2000;

/// Sequence-matching ratio in [0, 1] over characters, case-insensitive.
/// Two empty strings are identical (1.0); one empty string matches
/// nothing (0.0).
pub fn sequence_ratio(a: &str, b: &str) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    // Order the operands so the ratio is exactly symmetric.
    let (first, second) = if a <= b { (&a, &b) } else { (&b, &a) };
    f64::from(TextDiff::from_chars(first.as_str(), second.as_str()).ratio())
}

/// Name sub-score: sequence ratio over normalized names.
pub fn name_similarity(a: &str, b: &str) -> f64 {
    sequence_ratio(&text::normalize_name(a), &text::normalize_name(b))
}

/// Weighted similarity between two stories: 0.30 name, 0.50 body,
/// 0.20 title. Symmetric; `score(a, a) == 1.0`.
pub fn score(a: &StoryRecord, b: &StoryRecord) -> f64 {
    let name = name_similarity(&a.customer_name, &b.customer_name);
    let body = sequence_ratio(
        prefix(&a.body_text, BODY_COMPARE_CHARS),
        prefix(&b.body_text, BODY_COMPARE_CHARS),
    );
    let title = sequence_ratio(&a.title, &b.title);
    NAME_WEIGHT * name + BODY_WEIGHT * body + TITLE_WEIGHT * title
}

/// Body sub-score alone, used for duplicate-reason tagging.
pub fn body_similarity(a: &StoryRecord, b: &StoryRecord) -> f64 {
    sequence_ratio(
        prefix(&a.body_text, BODY_COMPARE_CHARS),
        prefix(&b.body_text, BODY_COMPARE_CHARS),
    )
}

pub fn title_similarity(a: &StoryRecord, b: &StoryRecord) -> f64 {
    sequence_ratio(&a.title, &b.title)
}

fn prefix(text: &str, limit: usize) -> &str {
    if text.len() <= limit {
        return text;
    }
    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
