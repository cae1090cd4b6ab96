use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Sources and stories
// ---------------------------------------------------------------------------

/// Identifies one vendor story site (e.g. "microsoft", "google-cloud").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(pub String);

impl SourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One harvested case study, as produced by the collection layer.
/// Immutable here — the classification and identity passes only read it.
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
pub struct StoryRecord {
    #[builder(default_code = "Uuid::new_v4()")]
    pub id: Uuid,
    #[builder(setter(into))]
    pub customer_name: String,
    #[builder(setter(into))]
    pub title: String,
    pub source_id: SourceId,
    #[builder(setter(into))]
    pub url: String,
    #[builder(setter(into))]
    pub body_text: String,
    #[builder(default_code = "Utc::now()")]
    pub scraped_at: DateTime<Utc>,
}

impl StoryRecord {
    /// Title and URL carry the least navigation contamination, so the
    /// definitive tiers check them before the full body.
    pub fn primary_text(&self) -> String {
        format!("{} {}", self.title, self.url)
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Which kind of AI the story describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum AiType {
    Generative,
    Traditional,
    Ambiguous,
}

impl AiType {
    /// The invariant: `is_gen_ai` must equal this for every persisted result.
    pub fn implies_gen_ai(self) -> bool {
        matches!(self, AiType::Generative)
    }
}

/// The decision stage that produced a classification, cheapest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Definitive GenAI vocabulary hit.
    DefinitiveGenAi,
    /// Definitive traditional-AI vocabulary hit, no GenAI hit.
    DefinitiveTraditional,
    /// Ambiguous vocabulary resolved by context-clue scoring.
    ContextHeuristic,
    /// External reasoning service verdict.
    RemoteReasoning,
}

impl Tier {
    pub fn number(self) -> u8 {
        match self {
            Tier::DefinitiveGenAi => 1,
            Tier::DefinitiveTraditional => 2,
            Tier::ContextHeuristic => 3,
            Tier::RemoteReasoning => 4,
        }
    }
}

/// The classification record persisted per story. A reclassification run
/// may overwrite it wholesale; it is never partially updated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub story_id: Uuid,
    pub is_gen_ai: bool,
    pub ai_type: AiType,
    pub tier: Tier,
    /// In [0, 1].
    pub confidence: f64,
    pub rationale: String,
    /// Vocabulary terms that drove the decision (empty for tier 4).
    pub source_terms: BTreeSet<String>,
    pub classified_at: DateTime<Utc>,
}

impl ClassificationResult {
    pub fn is_consistent(&self) -> bool {
        self.is_gen_ai == self.ai_type.implies_gen_ai()
    }
}

/// Outcome of running one story through the tier pipeline. A failed
/// escalation leaves the story pending — never a default guess.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClassificationOutcome {
    Classified(ClassificationResult),
    Pending {
        story_id: Uuid,
        attempts: u32,
        last_error: String,
    },
}

impl ClassificationOutcome {
    pub fn story_id(&self) -> Uuid {
        match self {
            ClassificationOutcome::Classified(r) => r.story_id,
            ClassificationOutcome::Pending { story_id, .. } => *story_id,
        }
    }

    pub fn as_classified(&self) -> Option<&ClassificationResult> {
        match self {
            ClassificationOutcome::Classified(r) => Some(r),
            ClassificationOutcome::Pending { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Duplicates
// ---------------------------------------------------------------------------

/// Why two stories were judged the same underlying case study.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateReason {
    /// Byte-identical URL.
    IdenticalUrl,
    /// Same host and near-identical content behind a different URL path.
    SameUrlDifferentPath,
    /// Content similarity above 0.95 — a straight copy.
    IdenticalContent,
    /// Same customer and title, body edited — a refreshed story.
    UpdatedContent,
    /// Same story re-published with rewritten framing.
    Republished,
}

/// Advisory annotation over same-source stories. Never deletes or hides
/// records; analytics decide what to do with it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateGroup {
    pub source_id: SourceId,
    pub canonical_story_id: Uuid,
    pub duplicate_story_ids: BTreeSet<Uuid>,
    pub similarity_score: f64,
    pub reason: DuplicateReason,
}

// ---------------------------------------------------------------------------
// Customer profiles
// ---------------------------------------------------------------------------

/// Record of one profile absorbing another, kept for traceability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeRecord {
    pub absorbed_profile_id: Uuid,
    pub triggering_story_ids: Vec<Uuid>,
    pub merged_at: DateTime<Utc>,
}

/// Cross-source identity for one real-world company. Created on first
/// sighting, mutated by linking, merged but never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerProfile {
    pub id: Uuid,
    pub canonical_name: String,
    pub alternative_names: BTreeSet<String>,
    pub linked_story_ids: BTreeSet<Uuid>,
    pub sources_present: BTreeSet<SourceId>,
    pub merges: Vec<MergeRecord>,
}

/// A near-threshold link decision deferred to a human. False identity
/// merges are harder to undo than missed merges, so we never auto-resolve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewFlag {
    pub story_id: Uuid,
    pub candidate_profile_id: Uuid,
    pub story_customer_name: String,
    pub candidate_name: String,
    pub name_score: f64,
    pub flagged_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn story() -> StoryRecord {
        StoryRecord::builder()
            .customer_name("Accenture")
            .title("Scaling support with AI")
            .source_id("microsoft".into())
            .url("https://example.com/stories/accenture")
            .body_text("Accenture deployed a copilot.")
            .build()
    }

    #[test]
    fn primary_text_combines_title_and_url() {
        let s = story();
        assert_eq!(
            s.primary_text(),
            "Scaling support with AI https://example.com/stories/accenture"
        );
    }

    #[test]
    fn tier_numbers_are_ordered() {
        assert_eq!(Tier::DefinitiveGenAi.number(), 1);
        assert_eq!(Tier::RemoteReasoning.number(), 4);
        assert!(Tier::DefinitiveGenAi < Tier::RemoteReasoning);
    }

    #[test]
    fn generative_implies_gen_ai() {
        assert!(AiType::Generative.implies_gen_ai());
        assert!(!AiType::Traditional.implies_gen_ai());
        assert!(!AiType::Ambiguous.implies_gen_ai());
    }

    #[test]
    fn consistency_check_detects_disagreement() {
        let s = story();
        let r = ClassificationResult {
            story_id: s.id,
            is_gen_ai: true,
            ai_type: AiType::Traditional,
            tier: Tier::DefinitiveTraditional,
            confidence: 0.9,
            rationale: String::new(),
            source_terms: BTreeSet::new(),
            classified_at: Utc::now(),
        };
        assert!(!r.is_consistent());
    }
}
