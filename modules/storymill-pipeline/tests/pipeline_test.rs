//! End-to-end pipeline scenarios over the in-memory store with a
//! scripted reasoner standing in for the external reasoning service.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use ai_client::AiError;
use storymill_classify::{Reasoner, StoryVerdict, TieredClassifier};
use storymill_common::{
    AiType, ClassificationResult, Config, SourceId, StoryRecord, TermVocabulary, Tier,
};
use storymill_pipeline::{ClassifyOptions, MemoryStore, Pipeline};

fn test_config() -> Config {
    Config {
        anthropic_api_key: String::new(),
        claude_model: "claude-sonnet-4-20250514".into(),
        vocabulary_path: None,
        duplicate_threshold: 0.85,
        cross_source_name_threshold: 0.80,
        review_band_floor: 0.75,
        tier3_certainty: 0.75,
        reasoner_timeout: Duration::from_secs(5),
        reasoner_max_attempts: 3,
        reasoner_concurrency: 2,
        classify_workers: 4,
    }
}

fn story(name: &str, title: &str, url: &str, body: &str, source: &str) -> StoryRecord {
    StoryRecord::builder()
        .customer_name(name)
        .title(title)
        .source_id(SourceId::new(source))
        .url(url)
        .body_text(body)
        .build()
}

/// Counts calls and always answers with a fixed verdict.
struct ScriptedReasoner {
    calls: AtomicU32,
    verdict: StoryVerdict,
}

impl ScriptedReasoner {
    fn traditional() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU32::new(0),
            verdict: StoryVerdict {
                is_gen_ai: false,
                ai_type: AiType::Traditional,
                confidence: 0.7,
                rationale: "no generative capability described".into(),
            },
        })
    }
}

#[async_trait]
impl Reasoner for ScriptedReasoner {
    async fn judge(&self, _: &StoryRecord, _: bool) -> Result<StoryVerdict, AiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.verdict.clone())
    }
}

/// Always fails transiently.
struct UnreachableService {
    calls: AtomicU32,
}

#[async_trait]
impl Reasoner for UnreachableService {
    async fn judge(&self, _: &StoryRecord, _: bool) -> Result<StoryVerdict, AiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(AiError::Api {
            status: 503,
            body: "overloaded".into(),
        })
    }
}

fn rule_only_pipeline(store: Arc<MemoryStore>) -> Pipeline {
    let config = test_config();
    let classifier = TieredClassifier::new(&TermVocabulary::builtin(), &config);
    Pipeline::new(store, classifier, config)
}

fn pipeline_with_reasoner(store: Arc<MemoryStore>, reasoner: Arc<dyn Reasoner>) -> Pipeline {
    let config = test_config();
    let classifier =
        TieredClassifier::new(&TermVocabulary::builtin(), &config).with_reasoner(reasoner);
    Pipeline::new(store, classifier, config)
}

// ---------------------------------------------------------------------------
// Classification scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn story_with_only_chatgpt_resolves_at_tier_one() {
    let store = Arc::new(MemoryStore::new());
    let s = story("Globex", "Untitled", "https://vendor.com/globex", "ChatGPT", "vendor");
    store.seed_stories(vec![s.clone()]).await;

    let report = rule_only_pipeline(store.clone())
        .run_classification(&ClassifyOptions::default())
        .await
        .unwrap();

    assert_eq!(report.tier_counts[0], 1);
    let r = store.classification(s.id).await.unwrap();
    assert_eq!(r.tier, Tier::DefinitiveGenAi);
    assert_eq!(r.ai_type, AiType::Generative);
    assert!(r.is_gen_ai);
    assert!((r.confidence - 1.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn decision_tree_story_resolves_at_tier_two() {
    let store = Arc::new(MemoryStore::new());
    let s = story(
        "Initech",
        "Claims triage",
        "https://vendor.com/initech",
        "Claims are routed by a decision tree driven by if-then rules.",
        "vendor",
    );
    store.seed_stories(vec![s.clone()]).await;

    rule_only_pipeline(store.clone())
        .run_classification(&ClassifyOptions::default())
        .await
        .unwrap();

    let r = store.classification(s.id).await.unwrap();
    assert_eq!(r.tier, Tier::DefinitiveTraditional);
    assert!(!r.is_gen_ai);
    assert!((r.confidence - 0.9).abs() < f64::EPSILON);
}

#[tokio::test]
async fn lone_ambiguous_term_escalates_to_tier_four() {
    let store = Arc::new(MemoryStore::new());
    let s = story(
        "Hooli",
        "Support modernization",
        "https://vendor.com/hooli",
        "Customers ask our virtual assistant about billing.",
        "vendor",
    );
    store.seed_stories(vec![s.clone()]).await;

    let reasoner = ScriptedReasoner::traditional();
    let report = pipeline_with_reasoner(store.clone(), reasoner.clone())
        .run_classification(&ClassifyOptions::default())
        .await
        .unwrap();

    assert_eq!(report.tier_counts[3], 1);
    assert_eq!(reasoner.calls.load(Ordering::SeqCst), 1);
    let r = store.classification(s.id).await.unwrap();
    assert_eq!(r.tier, Tier::RemoteReasoning);
    assert!(r.is_consistent());
}

#[tokio::test]
async fn reasoner_call_count_never_exceeds_corpus_size() {
    let store = Arc::new(MemoryStore::new());
    let stories: Vec<StoryRecord> = (0..12)
        .map(|i| {
            story(
                &format!("Company {i}"),
                "A modernization story",
                &format!("https://vendor.com/{i}"),
                "Customers ask our virtual assistant about billing.",
                "vendor",
            )
        })
        .collect();
    store.seed_stories(stories).await;

    let reasoner = ScriptedReasoner::traditional();
    let report = pipeline_with_reasoner(store.clone(), reasoner.clone())
        .run_classification(&ClassifyOptions::default())
        .await
        .unwrap();

    assert_eq!(report.total, 12);
    assert_eq!(reasoner.calls.load(Ordering::SeqCst), 12, "exactly one call per story");
}

#[tokio::test(start_paused = true)]
async fn unreachable_service_leaves_stories_pending_after_bounded_retries() {
    let store = Arc::new(MemoryStore::new());
    let s = story(
        "Hooli",
        "Support modernization",
        "https://vendor.com/hooli",
        "Customers ask our virtual assistant about billing.",
        "vendor",
    );
    store.seed_stories(vec![s.clone()]).await;

    let reasoner = Arc::new(UnreachableService { calls: AtomicU32::new(0) });
    let report = pipeline_with_reasoner(store.clone(), reasoner.clone())
        .run_classification(&ClassifyOptions::default())
        .await
        .unwrap();

    assert_eq!(report.pending, 1);
    assert_eq!(report.classified(), 0);
    assert_eq!(reasoner.calls.load(Ordering::SeqCst), 3, "retry bound respected");
    assert!(
        store.classification(s.id).await.is_none(),
        "no default guess is ever persisted"
    );
}

#[tokio::test]
async fn rule_only_run_makes_no_external_calls_and_leaves_pending() {
    let store = Arc::new(MemoryStore::new());
    let ambiguous = story(
        "Hooli",
        "Support modernization",
        "https://vendor.com/hooli",
        "Customers ask our virtual assistant about billing.",
        "vendor",
    );
    let definitive = story(
        "Globex",
        "Drafting with Claude",
        "https://vendor.com/globex",
        "Agents draft replies with Claude.",
        "vendor",
    );
    store.seed_stories(vec![ambiguous.clone(), definitive.clone()]).await;

    let report = rule_only_pipeline(store.clone())
        .run_classification(&ClassifyOptions::default())
        .await
        .unwrap();

    assert_eq!(report.pending, 1);
    assert_eq!(report.tier_counts[0], 1);
    assert!(store.classification(ambiguous.id).await.is_none());
    assert!(store.classification(definitive.id).await.is_some());
}

#[tokio::test]
async fn dry_run_reports_without_persisting() {
    let store = Arc::new(MemoryStore::new());
    let s = story("Globex", "Untitled", "https://vendor.com/globex", "ChatGPT", "vendor");
    store.seed_stories(vec![s.clone()]).await;

    let report = rule_only_pipeline(store.clone())
        .run_classification(&ClassifyOptions {
            dry_run: true,
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(report.tier_counts[0], 1);
    assert!(store.classification(s.id).await.is_none());
}

#[tokio::test]
async fn story_id_filter_restricts_the_run() {
    let store = Arc::new(MemoryStore::new());
    let a = story("Globex", "Untitled", "https://vendor.com/a", "ChatGPT", "vendor");
    let b = story("Initech", "Untitled", "https://vendor.com/b", "ChatGPT", "vendor");
    store.seed_stories(vec![a.clone(), b.clone()]).await;

    let opts = ClassifyOptions {
        story_ids: Some([a.id].into()),
        ..Default::default()
    };
    let report = rule_only_pipeline(store.clone())
        .run_classification(&opts)
        .await
        .unwrap();

    assert_eq!(report.total, 1);
    assert!(store.classification(a.id).await.is_some());
    assert!(store.classification(b.id).await.is_none());
}

#[tokio::test]
async fn only_unclassified_skips_already_classified_stories() {
    let store = Arc::new(MemoryStore::new());
    let a = story("Globex", "Untitled", "https://vendor.com/a", "ChatGPT", "vendor");
    let b = story("Initech", "Untitled", "https://vendor.com/b", "ChatGPT", "vendor");
    store.seed_stories(vec![a.clone(), b.clone()]).await;

    let pipeline = rule_only_pipeline(store.clone());
    pipeline
        .run_classification(&ClassifyOptions {
            story_ids: Some([a.id].into()),
            ..Default::default()
        })
        .await
        .unwrap();

    let report = pipeline
        .run_classification(&ClassifyOptions {
            only_unclassified: true,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(report.total, 1, "already classified story is skipped");
}

#[tokio::test]
async fn empty_body_is_rejected_not_classified() {
    let store = Arc::new(MemoryStore::new());
    let s = story("Globex", "Untitled", "https://vendor.com/globex", "   ", "vendor");
    store.seed_stories(vec![s.clone()]).await;

    let report = rule_only_pipeline(store.clone())
        .run_classification(&ClassifyOptions::default())
        .await
        .unwrap();

    assert_eq!(report.rejected, 1);
    assert!(store.classification(s.id).await.is_none());
}

// ---------------------------------------------------------------------------
// Consistency scan
// ---------------------------------------------------------------------------

#[tokio::test]
async fn consistency_scan_corrects_persisted_disagreement() {
    let store = Arc::new(MemoryStore::new());
    let s = story("Globex", "Untitled", "https://vendor.com/globex", "ChatGPT", "vendor");
    store.seed_stories(vec![s.clone()]).await;
    store
        .seed_classification(ClassificationResult {
            story_id: s.id,
            is_gen_ai: false, // contradicts ai_type
            ai_type: AiType::Generative,
            tier: Tier::RemoteReasoning,
            confidence: 0.8,
            rationale: "imported from a legacy run".into(),
            source_terms: Default::default(),
            classified_at: chrono::Utc::now(),
        })
        .await;

    let pipeline = rule_only_pipeline(store.clone());
    let corrected = pipeline.verify_consistency(false).await.unwrap();
    assert_eq!(corrected, 1);

    let r = store.classification(s.id).await.unwrap();
    assert!(r.is_consistent());
    assert!(r.is_gen_ai, "ai_type was authoritative");

    // Second scan finds nothing to fix.
    assert_eq!(pipeline.verify_consistency(false).await.unwrap(), 0);
}

// ---------------------------------------------------------------------------
// Dedup and linking scenarios
// ---------------------------------------------------------------------------

const SHARED_BODY: &str = "The retailer rolled out an assistant across two thousand stores, \
                           cutting average ticket handling time by forty percent in a quarter.";

#[tokio::test]
async fn same_source_identical_body_groups_as_duplicates() {
    let store = Arc::new(MemoryStore::new());
    let a = story("Globex", "AI at Globex", "https://vendor.com/stories/globex", SHARED_BODY, "vendor");
    let b = story(
        "Globex",
        "How Globex scaled support",
        "https://vendor.com/customers/globex-revisited",
        SHARED_BODY,
        "vendor",
    );
    store.seed_stories(vec![a, b]).await;

    let groups = rule_only_pipeline(store.clone()).run_dedup(None, false).await.unwrap();

    assert_eq!(groups.len(), 1);
    assert!(groups[0].similarity_score >= 0.85);
    assert_eq!(groups[0].duplicate_story_ids.len(), 1);
    assert_eq!(store.duplicate_groups().await.len(), 1);
}

#[tokio::test]
async fn duplicate_groups_never_span_sources() {
    let store = Arc::new(MemoryStore::new());
    let a = story("Globex", "AI at Globex", "https://a.com/globex", SHARED_BODY, "vendor-a");
    let b = story("Globex", "AI at Globex", "https://b.com/globex", SHARED_BODY, "vendor-b");
    store.seed_stories(vec![a, b]).await;

    let groups = rule_only_pipeline(store.clone()).run_dedup(None, false).await.unwrap();
    assert!(groups.is_empty());
}

#[tokio::test]
async fn accenture_and_accenture_plc_share_one_profile() {
    let store = Arc::new(MemoryStore::new());
    let a = story("Accenture", "AI at scale", "https://a.com/accenture", "body a", "source-a");
    let b = story("Accenture plc", "Scaling AI", "https://b.com/accenture", "body b", "source-b");
    store.seed_stories(vec![a, b]).await;

    let report = rule_only_pipeline(store.clone()).run_linking(false).await.unwrap();

    assert_eq!(report.created, 1);
    assert_eq!(report.linked, 1);
    assert_eq!(report.profiles, 1);

    let profiles = store.profiles().await;
    assert_eq!(profiles.len(), 1);
    let sources: Vec<&str> = profiles[0]
        .sources_present
        .iter()
        .map(|s| s.as_str())
        .collect();
    assert_eq!(sources, vec!["source-a", "source-b"]);
}

#[tokio::test]
async fn linking_dry_run_persists_nothing() {
    let store = Arc::new(MemoryStore::new());
    let a = story("Accenture", "AI at scale", "https://a.com/accenture", "body a", "source-a");
    store.seed_stories(vec![a]).await;

    let report = rule_only_pipeline(store.clone()).run_linking(true).await.unwrap();
    assert_eq!(report.created, 1);
    assert!(store.profiles().await.is_empty());
}
