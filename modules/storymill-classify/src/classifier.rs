//! The tiered classifier: a short-circuiting chain of cheap deciders
//! with one expensive fallback.
//!
//! Tiers 1-2 run twice — first over title+URL (the least contaminated
//! text), then over the full cleaned body. Tier 3 scores context clues
//! around ambiguous hits. Only tier 4 touches the network, bounded by a
//! semaphore sized to the reasoning service's rate limit.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use storymill_common::{
    text, ClassificationOutcome, ClassificationResult, Config, StoryMillError, StoryRecord,
    TermVocabulary, Tier,
};

use crate::escalate::{self, EscalationPolicy, Reasoner, StoryVerdict};
use crate::evidence::EvidenceScanner;
use crate::tiers::{decide_definitive, ContextScorer, Decision};

pub struct TieredClassifier {
    scanner: EvidenceScanner,
    context: ContextScorer,
    policy: EscalationPolicy,
    reasoner: Option<Arc<dyn Reasoner>>,
    reasoner_permits: Arc<Semaphore>,
}

impl TieredClassifier {
    /// Rule-only classifier: tiers 1-3 decide or the story stays pending.
    pub fn new(vocab: &TermVocabulary, config: &Config) -> Self {
        Self {
            scanner: EvidenceScanner::new(vocab),
            context: ContextScorer::new(vocab, config.tier3_certainty),
            policy: EscalationPolicy {
                timeout: config.reasoner_timeout,
                max_attempts: config.reasoner_max_attempts,
            },
            reasoner: None,
            reasoner_permits: Arc::new(Semaphore::new(config.reasoner_concurrency)),
        }
    }

    /// Attach the tier-4 reasoning collaborator.
    pub fn with_reasoner(mut self, reasoner: Arc<dyn Reasoner>) -> Self {
        self.reasoner = Some(reasoner);
        self
    }

    /// Classify one story through the tier chain. The whole pipeline for
    /// a story either completes or the story is left pending — there is
    /// no intra-story resumable state.
    pub async fn classify(
        &self,
        story: &StoryRecord,
    ) -> Result<ClassificationOutcome, StoryMillError> {
        validate(story)?;

        if let Some(decision) = self.run_rules(story) {
            return Ok(ClassificationOutcome::Classified(stamp(story, decision)));
        }

        let Some(reasoner) = &self.reasoner else {
            debug!(story_id = %story.id, "Rules inconclusive and escalation disabled, leaving pending");
            return Ok(ClassificationOutcome::Pending {
                story_id: story.id,
                attempts: 0,
                last_error: "rules inconclusive; escalation disabled for this run".into(),
            });
        };

        let _permit = self
            .reasoner_permits
            .acquire()
            .await
            .map_err(|_| StoryMillError::Reasoner("reasoner semaphore closed".into()))?;

        match escalate::escalate(reasoner.as_ref(), story, &self.policy).await {
            Ok(verdict) => {
                let mut result = stamp_verdict(story, verdict);
                // A contradictory verdict is corrected before it ever
                // leaves this function; ai_type is authoritative.
                enforce_consistency(&mut result);
                Ok(ClassificationOutcome::Classified(result))
            }
            Err(failure) => {
                info!(
                    story_id = %story.id,
                    attempts = failure.attempts,
                    error = %failure.last_error,
                    "Escalation failed, story left pending"
                );
                Ok(ClassificationOutcome::Pending {
                    story_id: story.id,
                    attempts: failure.attempts,
                    last_error: failure.last_error,
                })
            }
        }
    }

    /// Tiers 1-3. Pure; never fails — inconclusive means escalate.
    fn run_rules(&self, story: &StoryRecord) -> Option<Decision> {
        // Definitive indicators in title/URL are the most reliable signal.
        let primary = self.scanner.scan(&text::clean_body(&story.primary_text()));
        if let Some(decision) = decide_definitive(&primary) {
            return Some(decision);
        }

        let full_text = format!("{} {}", story.primary_text(), story.body_text);
        let evidence = self.scanner.scan(&text::clean_body(&full_text));
        if let Some(decision) = decide_definitive(&evidence) {
            return Some(decision);
        }

        self.context.decide(&evidence)
    }
}

/// Reject malformed input before tier 1. The collection layer owns
/// correction; this core only refuses.
fn validate(story: &StoryRecord) -> Result<(), StoryMillError> {
    if story.body_text.trim().is_empty() {
        return Err(StoryMillError::Input(format!(
            "story {} has empty body_text",
            story.id
        )));
    }
    if story.url.trim().is_empty() {
        return Err(StoryMillError::Input(format!(
            "story {} has empty url",
            story.id
        )));
    }
    Ok(())
}

fn stamp(story: &StoryRecord, decision: Decision) -> ClassificationResult {
    ClassificationResult {
        story_id: story.id,
        is_gen_ai: decision.ai_type.implies_gen_ai(),
        ai_type: decision.ai_type,
        tier: decision.tier,
        confidence: decision.confidence,
        rationale: decision.rationale,
        source_terms: decision.source_terms,
        classified_at: Utc::now(),
    }
}

fn stamp_verdict(story: &StoryRecord, verdict: StoryVerdict) -> ClassificationResult {
    ClassificationResult {
        story_id: story.id,
        is_gen_ai: verdict.is_gen_ai,
        ai_type: verdict.ai_type,
        tier: Tier::RemoteReasoning,
        confidence: verdict.confidence,
        rationale: verdict.rationale,
        source_terms: Default::default(),
        classified_at: Utc::now(),
    }
}

/// Enforce `is_gen_ai == (ai_type == generative)`, with `ai_type` as the
/// authoritative field. Returns true if a correction was applied; the
/// before/after values are logged for audit.
pub fn enforce_consistency(result: &mut ClassificationResult) -> bool {
    if result.is_consistent() {
        return false;
    }
    let before = result.is_gen_ai;
    result.is_gen_ai = result.ai_type.implies_gen_ai();
    warn!(
        story_id = %result.story_id,
        ai_type = ?result.ai_type,
        is_gen_ai_before = before,
        is_gen_ai_after = result.is_gen_ai,
        "Corrected inconsistent classification (ai_type authoritative)"
    );
    true
}
