//! Tier 4: escalation to the external reasoning service.
//!
//! The only tier allowed network cost. Calls are wrapped in a fixed
//! timeout with bounded exponential-backoff retries on transient
//! failures; a malformed structured response gets exactly one retry with
//! a stricter prompt before the story is surfaced as pending.

use std::time::Duration;

use ai_client::{AiError, Claude};
use async_trait::async_trait;
use rand::Rng;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use storymill_common::{AiType, StoryRecord};

/// Max story characters sent to the service. Classification does not need
/// the tail of a long page, and shorter prompts are cheaper.
const MAX_STORY_CHARS: usize = 16_000;

/// Base delay for exponential backoff. Actual delay is base * 2^attempt
/// plus random jitter (0-500ms).
const RETRY_BASE: Duration = Duration::from_secs(1);

const VERDICT_SYSTEM_PROMPT: &str = r#"You determine whether an AI customer story describes Generative AI or Traditional AI.

Use evidence-based classification, not keyword presence alone.

Generative AI indicators: named LLMs and LLM platforms (GPT, Claude, Gemini, Llama and similar), large language models, foundation models, content/text/code generation, conversational systems that compose novel responses.

Traditional AI indicators: supervised classification or regression only, clustering, rule-based and scripted systems, decision trees, keyword matching, OCR, classic analytics and BI reporting.

Ambiguous terms (virtual assistant, chatbot, document processing, speech recognition, personalization) must be resolved from evidence: what the system actually does, which platform powers it, and whether it generates novel output. If the story predates modern LLM deployments or describes purely predictive workloads, prefer traditional.

Set ai_type to "generative" or "traditional"; use "ambiguous" only when the story genuinely supports neither reading, and say why in the rationale. confidence is your certainty in [0,1]. Cite the specific technologies that drove the verdict in the rationale."#;

const STRICT_SUFFIX: &str = "\n\nYour previous response did not match the required schema. Respond ONLY via the structured tool with every field populated exactly as specified — no extra fields, no prose outside the tool call.";

/// The strict, parseable verdict shape requested from the service.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StoryVerdict {
    /// True iff the story describes generative AI.
    pub is_gen_ai: bool,
    pub ai_type: AiType,
    /// Certainty in [0, 1].
    pub confidence: f64,
    /// Evidence-citing explanation of the verdict.
    pub rationale: String,
}

/// The external reasoning seam. Production uses [`ClaudeReasoner`];
/// tests substitute deterministic fakes.
#[async_trait]
pub trait Reasoner: Send + Sync {
    async fn judge(&self, story: &StoryRecord, strict: bool) -> Result<StoryVerdict, AiError>;
}

pub struct ClaudeReasoner {
    claude: Claude,
}

impl ClaudeReasoner {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            claude: Claude::new(api_key, model),
        }
    }
}

#[async_trait]
impl Reasoner for ClaudeReasoner {
    async fn judge(&self, story: &StoryRecord, strict: bool) -> Result<StoryVerdict, AiError> {
        let system = if strict {
            format!("{VERDICT_SYSTEM_PROMPT}{STRICT_SUFFIX}")
        } else {
            VERDICT_SYSTEM_PROMPT.to_string()
        };

        let body = truncate_chars(&story.body_text, MAX_STORY_CHARS);
        let user = format!(
            "Classify this customer story.\n\nTitle: {}\nURL: {}\n\n---\n\n{body}",
            story.title, story.url
        );

        self.claude.extract::<StoryVerdict>(system, user).await
    }
}

/// Timeout and retry bounds for one story's escalation.
#[derive(Debug, Clone)]
pub struct EscalationPolicy {
    pub timeout: Duration,
    pub max_attempts: u32,
}

/// Why an escalation produced no verdict. The story stays pending.
#[derive(Debug, Clone)]
pub struct EscalationFailure {
    pub attempts: u32,
    pub last_error: String,
}

/// Drive the reasoner with the retry policy. Transient failures
/// (timeout, rate limit, 5xx) back off exponentially up to
/// `max_attempts`; a malformed verdict triggers one strict-prompt retry;
/// anything else fails immediately.
pub async fn escalate(
    reasoner: &dyn Reasoner,
    story: &StoryRecord,
    policy: &EscalationPolicy,
) -> Result<StoryVerdict, EscalationFailure> {
    let mut strict = false;
    let mut malformed_retry_used = false;
    let mut attempts = 0u32;
    let mut last_error = String::new();

    while attempts < policy.max_attempts {
        attempts += 1;
        debug!(story_id = %story.id, attempt = attempts, strict, "Escalating to reasoner");

        let outcome = tokio::time::timeout(policy.timeout, reasoner.judge(story, strict)).await;

        match outcome {
            Ok(Ok(mut verdict)) => {
                verdict.confidence = verdict.confidence.clamp(0.0, 1.0);
                return Ok(verdict);
            }
            Ok(Err(e)) if e.is_transient() => {
                warn!(story_id = %story.id, attempt = attempts, error = %e, "Transient reasoner failure");
                last_error = e.to_string();
                if attempts < policy.max_attempts {
                    backoff_sleep(attempts).await;
                }
            }
            Ok(Err(e @ AiError::Parse(_))) => {
                last_error = e.to_string();
                if malformed_retry_used {
                    warn!(story_id = %story.id, "Reasoner verdict still malformed after strict retry");
                    return Err(EscalationFailure { attempts, last_error });
                }
                // Garbled output must never be persisted as ground truth;
                // retry once with the stricter prompt, then give up.
                warn!(story_id = %story.id, "Malformed reasoner verdict, retrying with strict prompt");
                malformed_retry_used = true;
                strict = true;
            }
            Ok(Err(e)) => {
                warn!(story_id = %story.id, error = %e, "Permanent reasoner failure");
                return Err(EscalationFailure {
                    attempts,
                    last_error: e.to_string(),
                });
            }
            Err(_elapsed) => {
                warn!(story_id = %story.id, attempt = attempts, timeout_secs = policy.timeout.as_secs(), "Reasoner call timed out");
                last_error = format!("timed out after {}s", policy.timeout.as_secs());
                if attempts < policy.max_attempts {
                    backoff_sleep(attempts).await;
                }
            }
        }
    }

    Err(EscalationFailure { attempts, last_error })
}

async fn backoff_sleep(attempt: u32) {
    let backoff = RETRY_BASE * 2u32.pow(attempt - 1);
    let jitter = Duration::from_millis(rand::rng().random_range(0..500));
    tokio::time::sleep(backoff + jitter).await;
}

fn truncate_chars(text: &str, limit: usize) -> &str {
    if text.len() <= limit {
        return text;
    }
    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
