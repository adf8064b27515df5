pub mod config;
pub mod error;
pub mod lexicon;
pub mod types;

pub use config::Config;
pub use error::CounterpointError;
pub use lexicon::{classify_topics, detect_contrarian_signals, CONTRARIAN_SIGNALS, TOPIC_TAXONOMY};
pub use types::*;
