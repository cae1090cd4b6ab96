//! The rule tiers: pure, infallible decision functions.
//!
//! Each decider returns `Some(Decision)` or "inconclusive, escalate".
//! Nothing here performs I/O; tier 4 lives in `escalate`.

use std::collections::BTreeSet;

use regex::Regex;
use storymill_common::{AiType, TermVocabulary, Tier};

use crate::evidence::{compile_terms, EvidenceSet};

/// Raw clue score at which context evidence counts as strong.
const STRONG_EVIDENCE_SCORE: f64 = 2.0;

/// A tier's verdict before it is stamped onto a story.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub ai_type: AiType,
    pub tier: Tier,
    pub confidence: f64,
    pub rationale: String,
    pub source_terms: BTreeSet<String>,
}

/// Tiers 1 and 2: definitive vocabulary hits.
///
/// A GenAI hit always wins — stories routinely mention a legacy system
/// being replaced, so traditional terms only decide in the absence of
/// any generative signal.
pub fn decide_definitive(evidence: &EvidenceSet) -> Option<Decision> {
    if !evidence.definitive_genai_hits.is_empty() {
        return Some(Decision {
            ai_type: AiType::Generative,
            tier: Tier::DefinitiveGenAi,
            confidence: 1.0,
            rationale: format!(
                "Definitive generative-AI indicators: {}",
                sample_terms(&evidence.definitive_genai_hits)
            ),
            source_terms: evidence.definitive_genai_hits.clone(),
        });
    }

    if !evidence.definitive_traditional_hits.is_empty() {
        return Some(Decision {
            ai_type: AiType::Traditional,
            tier: Tier::DefinitiveTraditional,
            confidence: 0.9,
            rationale: format!(
                "Definitive traditional-AI indicators: {}",
                sample_terms(&evidence.definitive_traditional_hits)
            ),
            source_terms: evidence.definitive_traditional_hits.clone(),
        });
    }

    None
}

/// Tier 3: weighted context-clue scoring over the ambiguous hit windows.
pub struct ContextScorer {
    genai: Vec<ClueMatcher>,
    traditional: Vec<ClueMatcher>,
    /// Confidence a tier-3 verdict must clear to terminate the chain.
    certainty: f64,
}

struct ClueMatcher {
    weight: f64,
    terms: Vec<(String, Regex)>,
}

impl ContextScorer {
    pub fn new(vocab: &TermVocabulary, certainty: f64) -> Self {
        let compile = |tables: &[storymill_common::ClueTable]| -> Vec<ClueMatcher> {
            tables
                .iter()
                .map(|t| ClueMatcher {
                    weight: t.weight,
                    terms: compile_terms(&t.terms),
                })
                .collect()
        };
        Self {
            genai: compile(&vocab.genai_clues),
            traditional: compile(&vocab.traditional_clues),
            certainty,
        }
    }

    pub fn decide(&self, evidence: &EvidenceSet) -> Option<Decision> {
        if evidence.ambiguous_hits.is_empty() {
            return None;
        }

        let context = evidence.ambiguous_contexts.join(" … ");
        let (genai_score, genai_terms) = score(&self.genai, &context);
        let (traditional_score, traditional_terms) = score(&self.traditional, &context);

        if genai_score >= STRONG_EVIDENCE_SCORE && genai_score > traditional_score {
            let confidence = scaled_confidence(genai_score);
            if confidence >= self.certainty {
                return Some(decision_for(
                    AiType::Generative,
                    confidence,
                    genai_score,
                    &evidence.ambiguous_hits,
                    genai_terms,
                ));
            }
        }

        if traditional_score >= STRONG_EVIDENCE_SCORE && traditional_score > genai_score {
            let confidence = scaled_confidence(traditional_score);
            if confidence >= self.certainty {
                return Some(decision_for(
                    AiType::Traditional,
                    confidence,
                    traditional_score,
                    &evidence.ambiguous_hits,
                    traditional_terms,
                ));
            }
        }

        None
    }
}

fn score(matchers: &[ClueMatcher], context: &str) -> (f64, BTreeSet<String>) {
    let mut total = 0.0;
    let mut found = BTreeSet::new();
    for matcher in matchers {
        for (term, re) in &matcher.terms {
            if re.is_match(context) {
                total += matcher.weight;
                found.insert(term.clone());
            }
        }
    }
    (total, found)
}

/// Map a raw clue score into [0.6, 0.85]. Raw 2.0 → 0.8; raw 2.5+ caps
/// at 0.85 so tier 3 never outclaims a definitive hit.
fn scaled_confidence(raw_score: f64) -> f64 {
    (0.6 + raw_score / 10.0).min(0.85)
}

fn decision_for(
    ai_type: AiType,
    confidence: f64,
    raw_score: f64,
    ambiguous_hits: &BTreeSet<String>,
    clue_terms: BTreeSet<String>,
) -> Decision {
    let side = match ai_type {
        AiType::Generative => "generative",
        AiType::Traditional => "traditional",
        AiType::Ambiguous => "ambiguous",
    };
    let mut source_terms = ambiguous_hits.clone();
    source_terms.extend(clue_terms.iter().cloned());
    Decision {
        ai_type,
        tier: Tier::ContextHeuristic,
        confidence,
        rationale: format!(
            "Ambiguous terms ({}) with strong {side} context evidence (score {raw_score:.1}): {}",
            sample_terms(ambiguous_hits),
            sample_terms(&clue_terms),
        ),
        source_terms,
    }
}

/// First couple of terms, for human-readable rationales.
fn sample_terms(terms: &BTreeSet<String>) -> String {
    terms
        .iter()
        .take(2)
        .cloned()
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::EvidenceScanner;

    fn scan(text: &str) -> EvidenceSet {
        EvidenceScanner::new(&TermVocabulary::builtin()).scan(text)
    }

    fn scorer() -> ContextScorer {
        ContextScorer::new(&TermVocabulary::builtin(), 0.75)
    }

    // --- decide_definitive ---

    #[test]
    fn genai_hit_decides_tier_one_full_confidence() {
        let d = decide_definitive(&scan("we adopted chatgpt")).unwrap();
        assert_eq!(d.tier, Tier::DefinitiveGenAi);
        assert_eq!(d.ai_type, AiType::Generative);
        assert!((d.confidence - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn traditional_hit_decides_tier_two() {
        let d = decide_definitive(&scan("a decision tree with if-then rules")).unwrap();
        assert_eq!(d.tier, Tier::DefinitiveTraditional);
        assert_eq!(d.ai_type, AiType::Traditional);
        assert!((d.confidence - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn genai_hit_wins_over_traditional_hit() {
        let d = decide_definitive(&scan("replaced the decision tree with chatgpt")).unwrap();
        assert_eq!(d.tier, Tier::DefinitiveGenAi);
        assert_eq!(d.ai_type, AiType::Generative);
    }

    #[test]
    fn no_hits_is_inconclusive() {
        assert!(decide_definitive(&scan("a story about cloud migration")).is_none());
    }

    #[test]
    fn ambiguous_only_is_inconclusive_at_definitive_tiers() {
        assert!(decide_definitive(&scan("we built a virtual assistant")).is_none());
    }

    // --- ContextScorer ---

    #[test]
    fn strong_generative_context_decides_tier_three() {
        let ev = scan(
            "the virtual assistant generates responses using a generative model \
             that creates content for agents",
        );
        let d = scorer().decide(&ev).unwrap();
        assert_eq!(d.tier, Tier::ContextHeuristic);
        assert_eq!(d.ai_type, AiType::Generative);
        assert!(d.confidence >= 0.75);
    }

    #[test]
    fn strong_traditional_context_decides_tier_three() {
        let ev = scan(
            "the chatbot is rule-based with predefined responses and \
             scripted interactions following a decision tree",
        );
        let d = scorer().decide(&ev).unwrap();
        assert_eq!(d.ai_type, AiType::Traditional);
        assert!(d.confidence >= 0.75);
    }

    #[test]
    fn weak_context_is_inconclusive() {
        // One ambiguous term, no clue hits in its window
        let ev = scan("customers interact with the virtual assistant every day");
        assert!(scorer().decide(&ev).is_none());
    }

    #[test]
    fn clue_outside_window_does_not_count() {
        let padding = "the annual report covers many departments and initiatives. ".repeat(6);
        let text = format!("a chatbot answers billing questions. {padding}the marketing team generates new content ideas manually");
        let ev = scan(&text);
        // "generates new content" is far from the chatbot mention
        assert!(scorer().decide(&ev).is_none());
    }

    #[test]
    fn no_ambiguous_hits_skips_tier_three() {
        let ev = scan("plain infrastructure migration story");
        assert!(scorer().decide(&ev).is_none());
    }

    #[test]
    fn scaled_confidence_caps_below_definitive() {
        assert!((scaled_confidence(2.0) - 0.8).abs() < 1e-9);
        assert!((scaled_confidence(9.0) - 0.85).abs() < 1e-9);
    }
}
