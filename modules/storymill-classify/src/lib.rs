pub mod classifier;
pub mod escalate;
pub mod evidence;
pub mod tiers;

pub use classifier::TieredClassifier;
pub use escalate::{ClaudeReasoner, EscalationPolicy, Reasoner, StoryVerdict};
pub use evidence::{EvidenceScanner, EvidenceSet};
