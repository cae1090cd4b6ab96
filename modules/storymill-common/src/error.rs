use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoryMillError {
    #[error("Input error: {0}")]
    Input(String),

    #[error("Reasoner error: {0}")]
    Reasoner(String),

    #[error("Malformed reasoner verdict: {0}")]
    MalformedVerdict(String),

    #[error("Consistency error: {0}")]
    Consistency(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
