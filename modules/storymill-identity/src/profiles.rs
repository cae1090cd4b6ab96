//! Cross-source customer identity.
//!
//! The registry is an equivalence-class structure: profiles are
//! union-find slots with path compression, merges keep the older id
//! canonical, and nothing is ever deleted. Callers mutate through
//! `&mut self` — the pipeline serializes access behind a lock so
//! concurrent insertions cannot race into an accidental merge.

use std::collections::{BTreeSet, HashMap};

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use storymill_common::{text, CustomerProfile, MergeRecord, ReviewFlag, StoryRecord};

use crate::similarity;

/// How one story landed in the registry.
#[derive(Debug, Clone)]
pub enum LinkOutcome {
    /// Matched an existing profile.
    Linked { profile_id: Uuid },
    /// First sighting of this customer.
    Created { profile_id: Uuid },
    /// Near-threshold name match — deferred to manual review, nothing
    /// mutated. False merges are harder to undo than missed ones.
    NeedsReview(ReviewFlag),
}

impl LinkOutcome {
    pub fn profile_id(&self) -> Option<Uuid> {
        match self {
            LinkOutcome::Linked { profile_id } | LinkOutcome::Created { profile_id } => {
                Some(*profile_id)
            }
            LinkOutcome::NeedsReview(_) => None,
        }
    }
}

pub struct ProfileRegistry {
    /// Slot order is creation order, so a lower root index is the older
    /// profile and stays canonical under merge.
    slots: Vec<CustomerProfile>,
    parent: Vec<usize>,
    /// Normalized name → slot. Lookups chase the union-find root.
    by_name: HashMap<String, usize>,
    id_index: HashMap<Uuid, usize>,
    name_threshold: f64,
    review_floor: f64,
}

impl ProfileRegistry {
    pub fn new(name_threshold: f64, review_floor: f64) -> Self {
        Self {
            slots: Vec::new(),
            parent: Vec::new(),
            by_name: HashMap::new(),
            id_index: HashMap::new(),
            name_threshold,
            review_floor,
        }
    }

    /// Link one story to a profile: exact normalized-name match first,
    /// then fuzzy name matching against existing aliases, else a fresh
    /// profile.
    pub fn link_story(&mut self, story: &StoryRecord) -> LinkOutcome {
        let normalized = text::normalize_name(&story.customer_name);

        if let Some(&slot) = self.by_name.get(&normalized) {
            let root = self.find(slot);
            self.attach(root, story);
            return LinkOutcome::Linked {
                profile_id: self.slots[root].id,
            };
        }

        if let Some((root, best_score)) = self.best_fuzzy_match(&normalized) {
            if best_score >= self.name_threshold {
                debug!(
                    story_id = %story.id,
                    profile = %self.slots[root].canonical_name,
                    score = best_score,
                    "Fuzzy name match"
                );
                self.attach(root, story);
                self.register_name(&normalized, root, &[story.id]);
                let root = self.find(root);
                return LinkOutcome::Linked {
                    profile_id: self.slots[root].id,
                };
            }
            if best_score >= self.review_floor {
                let flag = ReviewFlag {
                    story_id: story.id,
                    candidate_profile_id: self.slots[root].id,
                    story_customer_name: story.customer_name.clone(),
                    candidate_name: self.slots[root].canonical_name.clone(),
                    name_score: best_score,
                    flagged_at: Utc::now(),
                };
                warn!(
                    story_id = %story.id,
                    candidate = %flag.candidate_name,
                    score = best_score,
                    "Ambiguous profile match flagged for review"
                );
                return LinkOutcome::NeedsReview(flag);
            }
        }

        let profile_id = self.create_profile(story, &normalized);
        LinkOutcome::Created { profile_id }
    }

    /// Union two profiles known to be the same entity. The older id
    /// stays canonical; the absorbed profile's names, stories, and
    /// sources are appended, and the merge is recorded with the story
    /// ids that triggered it.
    pub fn merge_profiles(
        &mut self,
        a: Uuid,
        b: Uuid,
        triggering_story_ids: &[Uuid],
    ) -> Option<Uuid> {
        let slot_a = self.find(*self.id_index.get(&a)?);
        let slot_b = self.find(*self.id_index.get(&b)?);
        if slot_a == slot_b {
            return Some(self.slots[slot_a].id);
        }

        let (keep, absorb) = if slot_a < slot_b {
            (slot_a, slot_b)
        } else {
            (slot_b, slot_a)
        };
        self.parent[absorb] = keep;

        let absorbed_id = self.slots[absorb].id;
        let absorbed = std::mem::replace(&mut self.slots[absorb], empty_profile(absorbed_id));
        let keeper = &mut self.slots[keep];
        keeper.alternative_names.insert(absorbed.canonical_name.clone());
        keeper.alternative_names.extend(absorbed.alternative_names);
        keeper.linked_story_ids.extend(absorbed.linked_story_ids);
        keeper.sources_present.extend(absorbed.sources_present);
        keeper.merges.push(MergeRecord {
            absorbed_profile_id: absorbed.id,
            triggering_story_ids: triggering_story_ids.to_vec(),
            merged_at: Utc::now(),
        });

        info!(
            kept = %keeper.id,
            absorbed = %absorbed.id,
            "Merged customer profiles"
        );
        Some(keeper.id)
    }

    /// Canonical view: one profile per equivalence class.
    pub fn profiles(&mut self) -> Vec<CustomerProfile> {
        let roots: BTreeSet<usize> = (0..self.slots.len()).map(|i| self.find(i)).collect();
        roots.into_iter().map(|i| self.slots[i].clone()).collect()
    }

    pub fn get(&mut self, profile_id: Uuid) -> Option<CustomerProfile> {
        let slot = self.find(*self.id_index.get(&profile_id)?);
        Some(self.slots[slot].clone())
    }

    // -- internals --

    fn attach(&mut self, root: usize, story: &StoryRecord) {
        let profile = &mut self.slots[root];
        profile.linked_story_ids.insert(story.id);
        profile.sources_present.insert(story.source_id.clone());
        // Record genuinely new spellings; case-only variants of the
        // canonical name carry no information.
        if !profile
            .canonical_name
            .eq_ignore_ascii_case(story.customer_name.trim())
        {
            profile.alternative_names.insert(story.customer_name.clone());
        }
    }

    /// Best fuzzy name score against every class's canonical and
    /// alternative names.
    fn best_fuzzy_match(&mut self, normalized: &str) -> Option<(usize, f64)> {
        let roots: BTreeSet<usize> = (0..self.slots.len()).map(|i| self.find(i)).collect();
        let mut best: Option<(usize, f64)> = None;
        for root in roots {
            let profile = &self.slots[root];
            let mut profile_best =
                similarity::sequence_ratio(normalized, &profile.canonical_name);
            for alias in &profile.alternative_names {
                let s =
                    similarity::sequence_ratio(normalized, &text::normalize_name(alias));
                profile_best = profile_best.max(s);
            }
            if best.map_or(true, |(_, s)| profile_best > s) {
                best = Some((root, profile_best));
            }
        }
        best
    }

    /// Register an alias name. If the name already resolves to a
    /// different class, the two classes are the same entity — merge.
    fn register_name(&mut self, normalized: &str, root: usize, triggering: &[Uuid]) {
        if let Some(&existing) = self.by_name.get(normalized) {
            let existing_root = self.find(existing);
            if existing_root != root {
                let a = self.slots[existing_root].id;
                let b = self.slots[root].id;
                self.merge_profiles(a, b, triggering);
            }
            return;
        }
        self.by_name.insert(normalized.to_string(), root);
    }

    fn create_profile(&mut self, story: &StoryRecord, normalized: &str) -> Uuid {
        let canonical_name = if normalized.is_empty() {
            story.customer_name.trim().to_lowercase()
        } else {
            normalized.to_string()
        };
        let mut alternative_names = BTreeSet::new();
        if !canonical_name.eq_ignore_ascii_case(story.customer_name.trim()) {
            alternative_names.insert(story.customer_name.clone());
        }

        let profile = CustomerProfile {
            id: Uuid::new_v4(),
            canonical_name: canonical_name.clone(),
            alternative_names,
            linked_story_ids: BTreeSet::from([story.id]),
            sources_present: BTreeSet::from([story.source_id.clone()]),
            merges: Vec::new(),
        };
        let id = profile.id;

        let slot = self.slots.len();
        self.slots.push(profile);
        self.parent.push(slot);
        self.id_index.insert(id, slot);
        self.by_name.insert(canonical_name, slot);

        debug!(profile = %id, name = %self.slots[slot].canonical_name, "Created customer profile");
        id
    }

    fn find(&mut self, x: usize) -> usize {
        if self.parent[x] != x {
            let root = self.find(self.parent[x]);
            self.parent[x] = root;
        }
        self.parent[x]
    }
}

fn empty_profile(id: Uuid) -> CustomerProfile {
    CustomerProfile {
        id,
        canonical_name: String::new(),
        alternative_names: BTreeSet::new(),
        linked_story_ids: BTreeSet::new(),
        sources_present: BTreeSet::new(),
        merges: Vec::new(),
    }
}
