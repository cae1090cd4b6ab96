//! The persistence seam.
//!
//! Real storage lives outside this core; the pipeline talks to a
//! [`StoryStore`]. [`MemoryStore`] backs tests and dry runs,
//! [`JsonStore`] is the flat-file adapter the CLI uses.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use storymill_common::{
    ClassificationResult, CustomerProfile, DuplicateGroup, ReviewFlag, StoryRecord,
};

#[async_trait]
pub trait StoryStore: Send + Sync {
    async fn load_stories(&self) -> Result<Vec<StoryRecord>>;
    async fn load_classifications(&self) -> Result<Vec<ClassificationResult>>;
    async fn save_classification(&self, result: &ClassificationResult) -> Result<()>;
    async fn save_duplicate_groups(&self, groups: &[DuplicateGroup]) -> Result<()>;
    async fn save_profiles(&self, profiles: &[CustomerProfile]) -> Result<()>;
    async fn save_review_flags(&self, flags: &[ReviewFlag]) -> Result<()>;
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// In-memory store for tests and dry runs.
#[derive(Default)]
pub struct MemoryStore {
    stories: RwLock<Vec<StoryRecord>>,
    classifications: RwLock<HashMap<Uuid, ClassificationResult>>,
    duplicate_groups: RwLock<Vec<DuplicateGroup>>,
    profiles: RwLock<Vec<CustomerProfile>>,
    review_flags: RwLock<Vec<ReviewFlag>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed_stories(&self, stories: Vec<StoryRecord>) {
        self.stories.write().await.extend(stories);
    }

    pub async fn seed_classification(&self, result: ClassificationResult) {
        self.classifications
            .write()
            .await
            .insert(result.story_id, result);
    }

    pub async fn classification(&self, story_id: Uuid) -> Option<ClassificationResult> {
        self.classifications.read().await.get(&story_id).cloned()
    }

    pub async fn duplicate_groups(&self) -> Vec<DuplicateGroup> {
        self.duplicate_groups.read().await.clone()
    }

    pub async fn profiles(&self) -> Vec<CustomerProfile> {
        self.profiles.read().await.clone()
    }

    pub async fn review_flags(&self) -> Vec<ReviewFlag> {
        self.review_flags.read().await.clone()
    }
}

#[async_trait]
impl StoryStore for MemoryStore {
    async fn load_stories(&self) -> Result<Vec<StoryRecord>> {
        Ok(self.stories.read().await.clone())
    }

    async fn load_classifications(&self) -> Result<Vec<ClassificationResult>> {
        Ok(self.classifications.read().await.values().cloned().collect())
    }

    async fn save_classification(&self, result: &ClassificationResult) -> Result<()> {
        self.classifications
            .write()
            .await
            .insert(result.story_id, result.clone());
        Ok(())
    }

    async fn save_duplicate_groups(&self, groups: &[DuplicateGroup]) -> Result<()> {
        *self.duplicate_groups.write().await = groups.to_vec();
        Ok(())
    }

    async fn save_profiles(&self, profiles: &[CustomerProfile]) -> Result<()> {
        *self.profiles.write().await = profiles.to_vec();
        Ok(())
    }

    async fn save_review_flags(&self, flags: &[ReviewFlag]) -> Result<()> {
        *self.review_flags.write().await = flags.to_vec();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// JsonStore
// ---------------------------------------------------------------------------

/// Flat-file adapter: stories come from a JSON array, outputs land as
/// JSON files in an output directory. Stands in for the real persistence
/// layer when running the CLI against an export.
pub struct JsonStore {
    stories_path: PathBuf,
    out_dir: PathBuf,
}

impl JsonStore {
    pub fn new(stories_path: impl Into<PathBuf>, out_dir: impl Into<PathBuf>) -> Self {
        Self {
            stories_path: stories_path.into(),
            out_dir: out_dir.into(),
        }
    }

    fn out_path(&self, name: &str) -> PathBuf {
        self.out_dir.join(name)
    }

    async fn write_json<T: serde::Serialize>(&self, name: &str, value: &T) -> Result<()> {
        tokio::fs::create_dir_all(&self.out_dir)
            .await
            .with_context(|| format!("creating {}", self.out_dir.display()))?;
        let path = self.out_path(name);
        let json = serde_json::to_vec_pretty(value)?;
        tokio::fs::write(&path, json)
            .await
            .with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    async fn read_json<T: serde::de::DeserializeOwned>(&self, path: &Path) -> Result<T> {
        let raw = tokio::fs::read(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_slice(&raw).with_context(|| format!("parsing {}", path.display()))
    }
}

#[async_trait]
impl StoryStore for JsonStore {
    async fn load_stories(&self) -> Result<Vec<StoryRecord>> {
        self.read_json(&self.stories_path).await
    }

    async fn load_classifications(&self) -> Result<Vec<ClassificationResult>> {
        let path = self.out_path("classifications.json");
        if !path.exists() {
            return Ok(Vec::new());
        }
        self.read_json(&path).await
    }

    async fn save_classification(&self, result: &ClassificationResult) -> Result<()> {
        let mut all = self.load_classifications().await?;
        all.retain(|r| r.story_id != result.story_id);
        all.push(result.clone());
        self.write_json("classifications.json", &all).await
    }

    async fn save_duplicate_groups(&self, groups: &[DuplicateGroup]) -> Result<()> {
        self.write_json("duplicate_groups.json", &groups).await
    }

    async fn save_profiles(&self, profiles: &[CustomerProfile]) -> Result<()> {
        self.write_json("customer_profiles.json", &profiles).await
    }

    async fn save_review_flags(&self, flags: &[ReviewFlag]) -> Result<()> {
        self.write_json("review_flags.json", &flags).await
    }
}
