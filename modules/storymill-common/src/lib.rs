pub mod config;
pub mod error;
pub mod text;
pub mod types;
pub mod vocabulary;

pub use config::Config;
pub use error::StoryMillError;
pub use types::*;
pub use vocabulary::{ClueTable, TermVocabulary};
