pub mod agents;
pub mod llm;
pub mod progress;
pub mod retriever;
pub mod store;
pub mod workflow;

pub use llm::{ChatModel, ChatOutcome, ModelClient, QueryEmbedder, TextEmbedder};
pub use progress::ProgressChannel;
pub use retriever::{RankedCandidate, Retriever};
pub use store::{CorpusStats, CorpusStore};
pub use workflow::Pipeline;
