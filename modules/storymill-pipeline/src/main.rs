use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use storymill_classify::{ClaudeReasoner, TieredClassifier};
use storymill_common::{Config, SourceId, TermVocabulary};
use storymill_pipeline::{ClassifyOptions, JsonStore, Pipeline};

#[derive(Parser)]
#[command(name = "storymill", about = "Classify and link harvested customer stories")]
struct Cli {
    /// JSON array of StoryRecords from the collection layer.
    #[arg(long, default_value = "stories.json")]
    input: PathBuf,

    /// Directory for classification, dedup, and profile outputs.
    #[arg(long, default_value = "out")]
    out: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the tiered classifier over the batch.
    Classify {
        /// Tiers 1-3 only — no external reasoning calls, zero cost.
        #[arg(long)]
        rule_only: bool,
        /// Report planned changes without persisting them.
        #[arg(long)]
        dry_run: bool,
        /// Restrict to specific story ids.
        #[arg(long = "story-id")]
        story_ids: Vec<Uuid>,
        /// Skip stories that already have a classification.
        #[arg(long)]
        only_unclassified: bool,
    },
    /// Group near-duplicate stories within each source.
    Dedup {
        /// Restrict to one source.
        #[arg(long)]
        source: Option<String>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Link stories to cross-source customer profiles.
    Link {
        #[arg(long)]
        dry_run: bool,
    },
    /// Scan persisted classifications for is_gen_ai/ai_type disagreement.
    VerifyConsistency {
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("storymill=info".parse()?))
        .init();

    let cli = Cli::parse();

    let rule_only = matches!(&cli.command, Command::Classify { rule_only: true, .. });
    let config = if rule_only {
        Config::rule_only_from_env()
    } else {
        Config::from_env()
    };
    config.log_redacted();

    let vocab = TermVocabulary::load(config.vocabulary_path.as_deref())?;
    info!(vocabulary_version = vocab.version, "Vocabulary loaded");

    let mut classifier = TieredClassifier::new(&vocab, &config);
    if !rule_only && !config.anthropic_api_key.is_empty() {
        classifier = classifier.with_reasoner(Arc::new(ClaudeReasoner::new(
            &config.anthropic_api_key,
            &config.claude_model,
        )));
    }

    let store = Arc::new(JsonStore::new(&cli.input, &cli.out));
    let pipeline = Pipeline::new(store, classifier, config);

    match cli.command {
        Command::Classify {
            dry_run,
            story_ids,
            only_unclassified,
            ..
        } => {
            let opts = ClassifyOptions {
                story_ids: (!story_ids.is_empty()).then(|| BTreeSet::from_iter(story_ids)),
                only_unclassified,
                dry_run,
            };
            pipeline.run_classification(&opts).await?;
        }
        Command::Dedup { source, dry_run } => {
            let groups = pipeline
                .run_dedup(source.map(|s| SourceId::new(s)), dry_run)
                .await?;
            info!(groups = groups.len(), dry_run, "Dedup pass complete");
        }
        Command::Link { dry_run } => {
            pipeline.run_linking(dry_run).await?;
        }
        Command::VerifyConsistency { dry_run } => {
            let corrected = pipeline.verify_consistency(dry_run).await?;
            info!(corrected, dry_run, "Consistency scan complete");
        }
    }

    Ok(())
}
