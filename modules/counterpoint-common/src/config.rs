use std::env;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// OpenRouter credential. Deliberately optional so the health probe can
    /// report a missing key instead of the process refusing to start.
    pub openrouter_api_key: String,

    // Per-stage models, overridable per deployment.
    pub scout_model: String,
    pub miner_model: String,
    pub architect_model: String,
    pub embedding_model: String,

    // Corpus
    pub chunks_path: String,

    // Retrieval policy
    /// Max candidates per guest in one result set (perspective diversity).
    pub max_per_guest: usize,

    // Web server
    pub web_host: String,
    pub web_port: u16,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if a malformed value is present.
    pub fn from_env() -> Self {
        Self {
            openrouter_api_key: env::var("OPENROUTER_API_KEY").unwrap_or_default(),
            scout_model: env::var("SCOUT_MODEL")
                .unwrap_or_else(|_| "google/gemini-2.5-flash".to_string()),
            miner_model: env::var("MINER_MODEL")
                .unwrap_or_else(|_| "google/gemini-2.5-flash-lite".to_string()),
            architect_model: env::var("ARCHITECT_MODEL")
                .unwrap_or_else(|_| "anthropic/claude-sonnet-4.5".to_string()),
            embedding_model: env::var("EMBEDDING_MODEL")
                .unwrap_or_else(|_| "openai/text-embedding-3-small".to_string()),
            chunks_path: env::var("CHUNKS_PATH")
                .unwrap_or_else(|_| "content/output/chunks.jsonl".to_string()),
            max_per_guest: env::var("MAX_PER_GUEST")
                .unwrap_or_else(|_| "1".to_string())
                .parse()
                .expect("MAX_PER_GUEST must be a number"),
            web_host: env::var("WEB_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            web_port: env::var("WEB_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .expect("WEB_PORT must be a number"),
        }
    }

    pub fn api_key_configured(&self) -> bool {
        !self.openrouter_api_key.is_empty()
    }
}
