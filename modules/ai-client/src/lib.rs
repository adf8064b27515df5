pub mod openrouter;
pub mod schema;
pub mod util;

pub use openrouter::{JsonCompletion, OpenRouter, Usage};
pub use schema::StructuredOutput;
