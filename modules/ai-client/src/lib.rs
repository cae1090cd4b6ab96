pub mod claude;
mod error;
mod schema;

pub use claude::Claude;
pub use error::AiError;
pub use schema::StructuredOutput;
