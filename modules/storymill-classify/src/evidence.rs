//! Vocabulary evidence scanning.
//!
//! Finds which curated terms appear in cleaned text using word-boundary
//! matching, so "AI" never matches inside "Air". No semantic judgement
//! happens here — that is the tier chain's job.

use std::collections::BTreeSet;

use regex::Regex;
use storymill_common::TermVocabulary;

/// Characters of context captured on each side of an ambiguous hit.
/// Tier 3 scores its clue tables against these windows only, so a
/// "generates" three paragraphs away does not vouch for a chatbot.
const CONTEXT_WINDOW: usize = 120;

/// Categorized vocabulary hits for one story. Ephemeral — recomputed per
/// classification call, never persisted.
#[derive(Debug, Clone)]
pub struct EvidenceSet {
    pub definitive_genai_hits: BTreeSet<String>,
    pub definitive_traditional_hits: BTreeSet<String>,
    pub ambiguous_hits: BTreeSet<String>,
    /// One window per ambiguous hit occurrence.
    pub ambiguous_contexts: Vec<String>,
    pub cleaned_text: String,
}

impl EvidenceSet {
    pub fn is_empty(&self) -> bool {
        self.definitive_genai_hits.is_empty()
            && self.definitive_traditional_hits.is_empty()
            && self.ambiguous_hits.is_empty()
    }
}

/// Compiled matchers for the three term categories.
pub struct EvidenceScanner {
    genai: Vec<(String, Regex)>,
    traditional: Vec<(String, Regex)>,
    ambiguous: Vec<(String, Regex)>,
}

impl EvidenceScanner {
    pub fn new(vocab: &TermVocabulary) -> Self {
        Self {
            genai: compile_terms(&vocab.definitive_genai),
            traditional: compile_terms(&vocab.definitive_traditional),
            ambiguous: compile_terms(&vocab.ambiguous),
        }
    }

    /// Scan cleaned text for all three categories. Case-insensitive,
    /// word-boundary-safe.
    pub fn scan(&self, cleaned_text: &str) -> EvidenceSet {
        let definitive_genai_hits = hit_set(&self.genai, cleaned_text);
        let definitive_traditional_hits = hit_set(&self.traditional, cleaned_text);

        let mut ambiguous_hits = BTreeSet::new();
        let mut ambiguous_contexts = Vec::new();
        for (term, re) in &self.ambiguous {
            for m in re.find_iter(cleaned_text) {
                ambiguous_hits.insert(term.clone());
                ambiguous_contexts.push(window(cleaned_text, m.start(), m.end()).to_string());
            }
        }

        EvidenceSet {
            definitive_genai_hits,
            definitive_traditional_hits,
            ambiguous_hits,
            ambiguous_contexts,
            cleaned_text: cleaned_text.to_string(),
        }
    }
}

pub(crate) fn compile_terms(terms: &[String]) -> Vec<(String, Regex)> {
    terms
        .iter()
        .map(|term| {
            let pattern = format!(r"(?i)\b{}\b", regex::escape(term));
            (
                term.clone(),
                Regex::new(&pattern).expect("escaped term is a valid regex"),
            )
        })
        .collect()
}

fn hit_set(compiled: &[(String, Regex)], text: &str) -> BTreeSet<String> {
    compiled
        .iter()
        .filter(|(_, re)| re.is_match(text))
        .map(|(term, _)| term.clone())
        .collect()
}

/// Slice ±CONTEXT_WINDOW bytes around a match, nudged to char boundaries.
fn window(text: &str, start: usize, end: usize) -> &str {
    let mut lo = start.saturating_sub(CONTEXT_WINDOW);
    while lo > 0 && !text.is_char_boundary(lo) {
        lo -= 1;
    }
    let mut hi = (end + CONTEXT_WINDOW).min(text.len());
    while hi < text.len() && !text.is_char_boundary(hi) {
        hi += 1;
    }
    &text[lo..hi]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scanner() -> EvidenceScanner {
        EvidenceScanner::new(&TermVocabulary::builtin())
    }

    #[test]
    fn finds_definitive_genai_term() {
        let ev = scanner().scan("the team rolled out chatgpt to every agent");
        assert!(ev.definitive_genai_hits.contains("chatgpt"));
        assert!(ev.definitive_traditional_hits.is_empty());
    }

    #[test]
    fn finds_definitive_traditional_term() {
        let ev = scanner().scan("a decision tree routes each claim");
        assert!(ev.definitive_traditional_hits.contains("decision tree"));
        assert!(ev.definitive_genai_hits.is_empty());
    }

    #[test]
    fn word_boundary_prevents_substring_match() {
        // "llm" must not fire inside a larger token
        let ev = scanner().scan("the wellness program at fullmetal industries");
        assert!(!ev.definitive_genai_hits.contains("llm"));
    }

    #[test]
    fn gpt_does_not_match_inside_identifier() {
        let ev = scanner().scan("the egyptian branch office");
        assert!(!ev.definitive_genai_hits.contains("gpt"));
    }

    #[test]
    fn hyphenated_term_matches_as_phrase() {
        let ev = scanner().scan("they used speech-to-text for call notes");
        assert!(ev.ambiguous_hits.contains("speech-to-text"));
    }

    #[test]
    fn matching_is_case_insensitive_over_raw_text() {
        let ev = scanner().scan("Powered by ChatGPT");
        assert!(ev.definitive_genai_hits.contains("chatgpt"));
    }

    #[test]
    fn ambiguous_hit_captures_context_window() {
        let text = "the bank launched a virtual assistant that generates personalized replies";
        let ev = scanner().scan(text);
        assert!(ev.ambiguous_hits.contains("virtual assistant"));
        assert_eq!(ev.ambiguous_contexts.len(), 1);
        assert!(ev.ambiguous_contexts[0].contains("generates personalized replies"));
    }

    #[test]
    fn one_window_per_occurrence() {
        let text = "a chatbot here. later, another chatbot there.";
        let ev = scanner().scan(text);
        assert_eq!(ev.ambiguous_contexts.len(), 2);
    }

    #[test]
    fn empty_text_yields_empty_evidence() {
        let ev = scanner().scan("");
        assert!(ev.is_empty());
        assert!(ev.ambiguous_contexts.is_empty());
    }

    #[test]
    fn multi_word_phrase_requires_exact_sequence() {
        let ev = scanner().scan("a large model of language adoption");
        assert!(!ev.definitive_genai_hits.contains("large language model"));
    }
}
