//! Classification term vocabulary.
//!
//! The vocabulary is injected configuration, not a hard-coded global: it
//! can be loaded from a versioned JSON file so curated terms evolve
//! without redeploying the classifier. `builtin()` is the curated table
//! shipped with the binary.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::StoryMillError;

/// One weighted table of context clues used by the tier-3 heuristic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClueTable {
    pub name: String,
    pub weight: f64,
    pub terms: Vec<String>,
}

/// The three curated term categories plus the weighted context-clue
/// tables that resolve ambiguous hits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TermVocabulary {
    pub version: u32,
    /// Unambiguously generative: specific models, LLM technology, and
    /// generative capabilities.
    pub definitive_genai: Vec<String>,
    /// Unambiguously classic ML / analytics / rule-based systems.
    pub definitive_traditional: Vec<String>,
    /// Terms that could be either and need context evidence.
    pub ambiguous: Vec<String>,
    pub genai_clues: Vec<ClueTable>,
    pub traditional_clues: Vec<ClueTable>,
}

impl TermVocabulary {
    /// Load from an optional file path, falling back to the builtin table.
    pub fn load(path: Option<&Path>) -> Result<Self, StoryMillError> {
        match path {
            Some(p) => Self::from_json_file(p),
            None => Ok(Self::builtin()),
        }
    }

    pub fn from_json_file(path: &Path) -> Result<Self, StoryMillError> {
        let raw = fs::read_to_string(path).map_err(|e| {
            StoryMillError::Config(format!("cannot read vocabulary {}: {e}", path.display()))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            StoryMillError::Config(format!("invalid vocabulary {}: {e}", path.display()))
        })
    }

    pub fn builtin() -> Self {
        fn terms(list: &[&str]) -> Vec<String> {
            list.iter().map(|t| t.to_string()).collect()
        }

        Self {
            version: 1,
            definitive_genai: terms(&[
                // Named models and products
                "gpt",
                "gpt-4",
                "gpt-3.5",
                "gpt-3",
                "chatgpt",
                "davinci",
                "gemini",
                "bard",
                "palm",
                "claude",
                "llama",
                "code llama",
                "mistral",
                "mixtral",
                "copilot",
                "github copilot",
                "microsoft 365 copilot",
                "cohere",
                // LLM technology
                "large language model",
                "llm",
                "foundation model",
                "transformer model",
                "generative ai",
                "gen ai",
                "genai",
                "generative artificial intelligence",
                // Generative capabilities
                "content generation",
                "text generation",
                "code generation",
                "natural language generation",
                "image generation",
                "creative writing",
                "prompt engineering",
                "few-shot learning",
                "zero-shot learning",
                // Generative platform services
                "azure openai",
                "vertex ai search",
                "gemini api",
            ]),
            definitive_traditional: terms(&[
                // Classic ML
                "supervised learning model",
                "regression analysis",
                "clustering algorithm",
                "decision tree",
                "random forest",
                "svm model",
                // Rule-based systems
                "rule-based system",
                "if-then rules",
                "expert system",
                "scripted responses",
                "keyword matching",
                "deterministic algorithm",
                "finite state machine",
                // Traditional analytics
                "statistical analysis",
                "descriptive analytics",
                "business intelligence dashboard",
                "data warehouse reporting",
                "basic ocr",
            ]),
            ambiguous: terms(&[
                // Could be scripted or LLM-powered
                "virtual assistant",
                "ai assistant",
                "chatbot",
                "conversational ai",
                "intelligent agent",
                "dialogue system",
                "voice interface",
                // Platforms that host both kinds
                "vertex ai",
                "bedrock",
                "hugging face",
                "sagemaker",
                "databricks",
                // Processing that may or may not generate
                "document processing",
                "form processing",
                "speech recognition",
                "speech-to-text",
                "natural language processing",
                "nlp",
                // Automation vocabulary
                "intelligent automation",
                "process automation",
                "workflow automation",
                "cognitive automation",
                // Applications
                "recommendation system",
                "personalization engine",
                "predictive analytics",
                "customer insights",
            ]),
            genai_clues: vec![
                ClueTable {
                    name: "strong_generative_evidence".into(),
                    weight: 1.0,
                    terms: terms(&[
                        "using llm",
                        "powered by gpt",
                        "foundation model",
                        "transformer architecture",
                        "prompt-based",
                        "generative model",
                        "large language",
                        "ai-generated content",
                        "creates content",
                        "generates responses",
                        "generates",
                        "writes content",
                    ]),
                },
                ClueTable {
                    name: "generative_capabilities".into(),
                    weight: 0.7,
                    terms: terms(&[
                        "understands context",
                        "natural conversation",
                        "creative responses",
                        "generates new content",
                        "adaptive responses",
                        "contextual understanding",
                        "human-like interaction",
                        "reasoning capabilities",
                    ]),
                },
                ClueTable {
                    name: "generative_timeframe".into(),
                    weight: 0.3,
                    terms: terms(&["2023", "2024", "2025", "next-generation ai"]),
                },
            ],
            traditional_clues: vec![
                ClueTable {
                    name: "strong_traditional_evidence".into(),
                    weight: 1.0,
                    terms: terms(&[
                        "rule-based",
                        "predefined responses",
                        "decision tree",
                        "classification only",
                        "pattern matching",
                        "statistical model",
                        "supervised learning",
                        "feature engineering",
                        "scripted",
                        "if-then",
                    ]),
                },
                ClueTable {
                    name: "traditional_limitations".into(),
                    weight: 0.6,
                    terms: terms(&[
                        "limited responses",
                        "scripted interactions",
                        "predefined workflows",
                        "structured data only",
                        "keyword-based",
                        "template responses",
                    ]),
                },
                ClueTable {
                    name: "traditional_timeframe".into(),
                    weight: 0.3,
                    terms: terms(&["2019", "2020", "2021", "traditional ml"]),
                },
            ],
        }
    }
}

impl Default for TermVocabulary {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_has_all_categories() {
        let vocab = TermVocabulary::builtin();
        assert!(!vocab.definitive_genai.is_empty());
        assert!(!vocab.definitive_traditional.is_empty());
        assert!(!vocab.ambiguous.is_empty());
        assert_eq!(vocab.genai_clues.len(), 3);
        assert_eq!(vocab.traditional_clues.len(), 3);
    }

    #[test]
    fn builtin_round_trips_through_json() {
        let vocab = TermVocabulary::builtin();
        let json = serde_json::to_string(&vocab).unwrap();
        let back: TermVocabulary = serde_json::from_str(&json).unwrap();
        assert_eq!(back.version, vocab.version);
        assert_eq!(back.definitive_genai, vocab.definitive_genai);
    }

    #[test]
    fn load_without_path_uses_builtin() {
        let vocab = TermVocabulary::load(None).unwrap();
        assert!(vocab.ambiguous.contains(&"virtual assistant".to_string()));
    }
}
