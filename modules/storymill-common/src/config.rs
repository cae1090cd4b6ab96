use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::info;

/// Application configuration loaded from environment variables.
///
/// The similarity and certainty thresholds are empirically chosen
/// constants, not derived truths — they are env-tunable so a labeled
/// sample can revalidate them without a redeploy.
#[derive(Debug, Clone)]
pub struct Config {
    // External reasoning service
    pub anthropic_api_key: String,
    pub claude_model: String,

    // Vocabulary
    pub vocabulary_path: Option<PathBuf>,

    // Thresholds
    pub duplicate_threshold: f64,
    pub cross_source_name_threshold: f64,
    pub review_band_floor: f64,
    pub tier3_certainty: f64,

    // Tier-4 resource model
    pub reasoner_timeout: Duration,
    pub reasoner_max_attempts: u32,
    pub reasoner_concurrency: usize,

    // Batch pipeline
    pub classify_workers: usize,
}

impl Config {
    /// Load full configuration. Panics with a clear message if required
    /// vars are missing.
    pub fn from_env() -> Self {
        Self {
            anthropic_api_key: required_env("ANTHROPIC_API_KEY"),
            ..Self::rule_only_from_env()
        }
    }

    /// Load configuration for rule-only runs — no reasoning service key
    /// needed, tiers 1-3 never leave the process.
    pub fn rule_only_from_env() -> Self {
        Self {
            anthropic_api_key: String::new(),
            claude_model: env::var("STORYMILL_MODEL")
                .unwrap_or_else(|_| "claude-sonnet-4-20250514".to_string()),
            vocabulary_path: env::var("STORYMILL_VOCABULARY").ok().map(PathBuf::from),
            duplicate_threshold: parsed_env("STORYMILL_DUPLICATE_THRESHOLD", 0.85),
            cross_source_name_threshold: parsed_env("STORYMILL_NAME_THRESHOLD", 0.80),
            review_band_floor: parsed_env("STORYMILL_REVIEW_FLOOR", 0.75),
            tier3_certainty: parsed_env("STORYMILL_TIER3_CERTAINTY", 0.75),
            reasoner_timeout: Duration::from_secs(parsed_env(
                "STORYMILL_REASONER_TIMEOUT_SECS",
                60u64,
            )),
            reasoner_max_attempts: parsed_env("STORYMILL_REASONER_ATTEMPTS", 3u32),
            reasoner_concurrency: parsed_env("STORYMILL_REASONER_CONCURRENCY", 4usize),
            classify_workers: parsed_env("STORYMILL_WORKERS", 8usize),
        }
    }

    pub fn log_redacted(&self) {
        info!(
            model = %self.claude_model,
            duplicate_threshold = self.duplicate_threshold,
            name_threshold = self.cross_source_name_threshold,
            tier3_certainty = self.tier3_certainty,
            reasoner_concurrency = self.reasoner_concurrency,
            workers = self.classify_workers,
            api_key_set = !self.anthropic_api_key.is_empty(),
            "Configuration loaded"
        );
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}

fn parsed_env<T: FromStr + Copy>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|_| panic!("{key} must parse as {}", std::any::type_name::<T>())),
        Err(_) => default,
    }
}
