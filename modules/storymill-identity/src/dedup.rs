//! Same-source duplicate grouping.
//!
//! Strictly advisory: groups annotate relationships between stories for
//! analytics. Nothing here deletes, hides, or blocks a record.

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, info};

use storymill_common::{text, DuplicateGroup, DuplicateReason, StoryRecord};

use crate::similarity;

/// Pairs whose normalized customer names agree less than this are never
/// duplicates — different companies republishing similar prose is noise,
/// not identity.
const NAME_PRUNE_THRESHOLD: f64 = 0.7;

/// Body similarity above this means a straight copy.
const IDENTICAL_CONTENT_THRESHOLD: f64 = 0.95;

pub struct DuplicateResolver {
    duplicate_threshold: f64,
}

impl DuplicateResolver {
    pub fn new(duplicate_threshold: f64) -> Self {
        Self { duplicate_threshold }
    }

    /// Group near-duplicate stories. Input may span sources; comparison
    /// and grouping happen strictly within one source, so no group can
    /// ever cross a source boundary.
    pub fn resolve(&self, stories: &[StoryRecord]) -> Vec<DuplicateGroup> {
        let mut by_source: HashMap<_, Vec<&StoryRecord>> = HashMap::new();
        for story in stories {
            by_source.entry(&story.source_id).or_default().push(story);
        }

        let mut groups = Vec::new();
        for (source_id, members) in by_source {
            let found = self.resolve_one_source(&members);
            debug!(source = %source_id, stories = members.len(), groups = found.len(), "Source dedup pass");
            groups.extend(found);
        }

        info!(groups = groups.len(), "Duplicate resolution complete");
        groups
    }

    fn resolve_one_source(&self, stories: &[&StoryRecord]) -> Vec<DuplicateGroup> {
        // Blocking: full pairwise comparison is O(n²), so restrict it to
        // stories sharing a normalized customer name.
        let mut buckets: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, story) in stories.iter().enumerate() {
            buckets
                .entry(text::normalize_name(&story.customer_name))
                .or_default()
                .push(idx);
        }

        let mut uf = UnionFind::new(stories.len());
        for indices in buckets.values() {
            for (i, &a) in indices.iter().enumerate() {
                for &b in &indices[i + 1..] {
                    if self.is_duplicate_pair(stories[a], stories[b]) {
                        uf.union(a, b);
                    }
                }
            }
        }

        // Materialize one group per non-trivial component.
        let mut components: HashMap<usize, Vec<usize>> = HashMap::new();
        for idx in 0..stories.len() {
            components.entry(uf.find(idx)).or_default().push(idx);
        }

        let mut groups: Vec<DuplicateGroup> = components
            .into_values()
            .filter(|members| members.len() > 1)
            .map(|members| self.build_group(stories, &members))
            .collect();
        groups.sort_by_key(|g| g.canonical_story_id);
        groups
    }

    fn is_duplicate_pair(&self, a: &StoryRecord, b: &StoryRecord) -> bool {
        if a.url == b.url {
            return true;
        }
        if similarity::name_similarity(&a.customer_name, &b.customer_name)
            < NAME_PRUNE_THRESHOLD
        {
            return false;
        }
        similarity::score(a, b) >= self.duplicate_threshold
    }

    fn build_group(&self, stories: &[&StoryRecord], members: &[usize]) -> DuplicateGroup {
        // Earliest-scraped story stands for the group; id breaks ties so
        // repeated runs pick the same canonical.
        let canonical_idx = *members
            .iter()
            .min_by_key(|&&idx| (stories[idx].scraped_at, stories[idx].id))
            .expect("group has members");
        let canonical = stories[canonical_idx];

        let mut duplicate_story_ids = BTreeSet::new();
        let mut group_score = f64::INFINITY;
        let mut best: Option<(f64, DuplicateReason)> = None;

        for &idx in members {
            if idx == canonical_idx {
                continue;
            }
            let dup = stories[idx];
            duplicate_story_ids.insert(dup.id);
            let pair_score = similarity::score(canonical, dup);
            // Conservative group score: the weakest canonical link.
            group_score = group_score.min(pair_score);
            let reason = classify_reason(canonical, dup);
            if best.map_or(true, |(s, _)| pair_score > s) {
                best = Some((pair_score, reason));
            }
        }

        DuplicateGroup {
            source_id: canonical.source_id.clone(),
            canonical_story_id: canonical.id,
            duplicate_story_ids,
            similarity_score: group_score,
            reason: best.map(|(_, r)| r).unwrap_or(DuplicateReason::Republished),
        }
    }
}

/// Tag why two stories are the same case study, from their metadata
/// differences.
fn classify_reason(canonical: &StoryRecord, dup: &StoryRecord) -> DuplicateReason {
    if canonical.url == dup.url {
        return DuplicateReason::IdenticalUrl;
    }

    let same_host = match (url::Url::parse(&canonical.url), url::Url::parse(&dup.url)) {
        (Ok(a), Ok(b)) => a.host_str() == b.host_str() && a.path() != b.path(),
        _ => false,
    };
    let body = similarity::body_similarity(canonical, dup);

    if same_host && body > IDENTICAL_CONTENT_THRESHOLD {
        return DuplicateReason::SameUrlDifferentPath;
    }
    if body > IDENTICAL_CONTENT_THRESHOLD {
        return DuplicateReason::IdenticalContent;
    }

    let title = similarity::title_similarity(canonical, dup);
    let name = similarity::name_similarity(&canonical.customer_name, &dup.customer_name);
    if title >= 0.9 && name >= 0.8 && canonical.scraped_at != dup.scraped_at {
        return DuplicateReason::UpdatedContent;
    }

    DuplicateReason::Republished
}

/// Union-find with path compression.
struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, x: usize) -> usize {
        if self.parent[x] != x {
            let root = self.find(self.parent[x]);
            self.parent[x] = root;
        }
        self.parent[x]
    }

    fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            // Lower index wins so roots are deterministic.
            let (keep, absorb) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[absorb] = keep;
        }
    }
}
