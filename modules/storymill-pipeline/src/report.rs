//! Run summaries surfaced to operators.

use serde::Serialize;
use tracing::info;

use storymill_common::Tier;

/// What one classification run did: how many stories each tier resolved,
/// how many are still pending, and what the external-call cost was.
#[derive(Debug, Default, Clone, Serialize)]
pub struct RunReport {
    pub total: usize,
    /// Index 0 = tier 1 … index 3 = tier 4.
    pub tier_counts: [usize; 4],
    /// Escalation failed or was disabled; retried next run.
    pub pending: usize,
    /// Rejected input (empty body/url).
    pub rejected: usize,
    pub corrected_inconsistencies: usize,
    pub dry_run: bool,
}

impl RunReport {
    pub fn record_tier(&mut self, tier: Tier) {
        self.tier_counts[(tier.number() - 1) as usize] += 1;
    }

    pub fn classified(&self) -> usize {
        self.tier_counts.iter().sum()
    }

    /// Fraction of classified stories resolved without the external
    /// reasoning service — the number tiers 1-3 exist to maximize.
    pub fn skip_rate(&self) -> f64 {
        let classified = self.classified();
        if classified == 0 {
            return 0.0;
        }
        (classified - self.tier_counts[3]) as f64 / classified as f64
    }

    pub fn log_summary(&self) {
        info!(
            total = self.total,
            tier1 = self.tier_counts[0],
            tier2 = self.tier_counts[1],
            tier3 = self.tier_counts[2],
            tier4 = self.tier_counts[3],
            pending = self.pending,
            rejected = self.rejected,
            corrected = self.corrected_inconsistencies,
            skip_rate = format!("{:.1}%", self.skip_rate() * 100.0),
            dry_run = self.dry_run,
            "Classification run complete"
        );
    }
}

/// What one linking run did.
#[derive(Debug, Default, Clone, Serialize)]
pub struct LinkReport {
    pub stories_seen: usize,
    pub linked: usize,
    pub created: usize,
    pub flagged_for_review: usize,
    pub profiles: usize,
    pub dry_run: bool,
}

impl LinkReport {
    pub fn log_summary(&self) {
        info!(
            stories = self.stories_seen,
            linked = self.linked,
            created = self.created,
            flagged = self.flagged_for_review,
            profiles = self.profiles,
            dry_run = self.dry_run,
            "Profile linking complete"
        );
    }
}
