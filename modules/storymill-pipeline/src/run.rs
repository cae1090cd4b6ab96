//! Batch orchestration.
//!
//! Tiers 1-3 are pure and CPU-bound, so stories fan out across a bounded
//! worker pool; the classifier's internal semaphore additionally bounds
//! concurrent tier-4 calls. A story's outcome is persisted only after its
//! tier pipeline completes, so interrupting a batch between stories never
//! leaves a half-written result. Profile linking mutates shared registry
//! state and is serialized behind a lock.

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::Result;
use futures::{stream, StreamExt};
use tracing::{info, warn};
use uuid::Uuid;

use storymill_classify::classifier::{self, TieredClassifier};
use storymill_common::{ClassificationOutcome, Config, SourceId, StoryMillError, StoryRecord};
use storymill_identity::{DuplicateResolver, LinkOutcome, ProfileRegistry};

use crate::report::{LinkReport, RunReport};
use crate::store::StoryStore;

#[derive(Debug, Default, Clone)]
pub struct ClassifyOptions {
    /// Restrict the run to these stories.
    pub story_ids: Option<BTreeSet<Uuid>>,
    /// Skip stories that already have a persisted classification.
    pub only_unclassified: bool,
    /// Report what would change without persisting anything.
    pub dry_run: bool,
}

pub struct Pipeline {
    store: Arc<dyn StoryStore>,
    classifier: Arc<TieredClassifier>,
    registry: tokio::sync::Mutex<ProfileRegistry>,
    config: Config,
}

impl Pipeline {
    pub fn new(store: Arc<dyn StoryStore>, classifier: TieredClassifier, config: Config) -> Self {
        let registry = tokio::sync::Mutex::new(ProfileRegistry::new(
            config.cross_source_name_threshold,
            config.review_band_floor,
        ));
        Self {
            store,
            classifier: Arc::new(classifier),
            registry,
            config,
        }
    }

    /// Classify a batch of stories. Each story runs its tier chain at
    /// most once per run — in particular, at most one escalation per
    /// story — and failures are per-story, never fatal to the batch.
    pub async fn run_classification(&self, opts: &ClassifyOptions) -> Result<RunReport> {
        let mut stories = self.store.load_stories().await?;

        if let Some(wanted) = &opts.story_ids {
            stories.retain(|s| wanted.contains(&s.id));
        }
        if opts.only_unclassified {
            let classified: BTreeSet<Uuid> = self
                .store
                .load_classifications()
                .await?
                .into_iter()
                .map(|r| r.story_id)
                .collect();
            stories.retain(|s| !classified.contains(&s.id));
        }

        let mut report = RunReport {
            total: stories.len(),
            dry_run: opts.dry_run,
            ..Default::default()
        };
        info!(stories = stories.len(), dry_run = opts.dry_run, "Starting classification run");

        let outcomes: Vec<(Uuid, Result<ClassificationOutcome, StoryMillError>)> =
            stream::iter(stories)
                .map(|story| {
                    let classifier = self.classifier.clone();
                    async move { (story.id, classifier.classify(&story).await) }
                })
                .buffer_unordered(self.config.classify_workers.max(1))
                .collect()
                .await;

        for (story_id, outcome) in outcomes {
            match outcome {
                Ok(ClassificationOutcome::Classified(result)) => {
                    report.record_tier(result.tier);
                    if !opts.dry_run {
                        self.store.save_classification(&result).await?;
                    }
                }
                Ok(ClassificationOutcome::Pending { attempts, last_error, .. }) => {
                    report.pending += 1;
                    info!(story_id = %story_id, attempts, error = %last_error, "Story pending");
                }
                Err(e) => {
                    report.rejected += 1;
                    warn!(story_id = %story_id, error = %e, "Story rejected");
                }
            }
        }

        report.log_summary();
        Ok(report)
    }

    /// Per-source duplicate grouping. Advisory — only writes annotation
    /// records, never touches stories.
    pub async fn run_dedup(
        &self,
        source: Option<SourceId>,
        dry_run: bool,
    ) -> Result<Vec<storymill_common::DuplicateGroup>> {
        let mut stories = self.store.load_stories().await?;
        if let Some(source) = source {
            stories.retain(|s| s.source_id == source);
        }

        let resolver = DuplicateResolver::new(self.config.duplicate_threshold);
        let groups = resolver.resolve(&stories);

        if !dry_run {
            self.store.save_duplicate_groups(&groups).await?;
        }
        Ok(groups)
    }

    /// Link every story to a customer profile. Registry access is
    /// serialized: a half-applied link could merge two distinct
    /// companies, so insertions never race.
    pub async fn run_linking(&self, dry_run: bool) -> Result<LinkReport> {
        let mut stories = self.store.load_stories().await?;
        // Deterministic order: oldest scrape first, so the oldest sighting
        // founds each profile.
        stories.sort_by_key(|s| (s.scraped_at, s.id));

        let mut report = LinkReport {
            stories_seen: stories.len(),
            dry_run,
            ..Default::default()
        };
        let mut flags = Vec::new();

        let mut registry = self.registry.lock().await;
        for story in &stories {
            match registry.link_story(story) {
                LinkOutcome::Linked { .. } => report.linked += 1,
                LinkOutcome::Created { .. } => report.created += 1,
                LinkOutcome::NeedsReview(flag) => {
                    report.flagged_for_review += 1;
                    flags.push(flag);
                }
            }
        }
        let profiles = registry.profiles();
        drop(registry);

        report.profiles = profiles.len();
        if !dry_run {
            self.store.save_profiles(&profiles).await?;
            self.store.save_review_flags(&flags).await?;
        }

        report.log_summary();
        Ok(report)
    }

    /// Link a single new story as it arrives from the collection layer.
    pub async fn link_story(&self, story: &StoryRecord) -> LinkOutcome {
        self.registry.lock().await.link_story(story)
    }

    /// Scan persisted classifications for `is_gen_ai` / `ai_type`
    /// disagreement and correct them, `ai_type` authoritative. Returns
    /// the number of corrections.
    pub async fn verify_consistency(&self, dry_run: bool) -> Result<usize> {
        let mut corrected = 0usize;
        for mut result in self.store.load_classifications().await? {
            if classifier::enforce_consistency(&mut result) {
                corrected += 1;
                if !dry_run {
                    self.store.save_classification(&result).await?;
                }
            }
        }
        if corrected > 0 {
            warn!(corrected, dry_run, "Consistency scan corrected records");
        } else {
            info!("Consistency scan clean");
        }
        Ok(corrected)
    }
}
