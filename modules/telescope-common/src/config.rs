use std::env;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Dedup engine
    pub similarity_threshold: f64,
    pub dedup_window_hours: i64,
    pub dedup_top_k: usize,

    // Qdrant (optional — unset QDRANT_URL disables the semantic path)
    pub qdrant_url: Option<String>,
    pub qdrant_api_key: Option<String>,
    pub qdrant_collection: String,
    pub qdrant_distance: String,
    pub qdrant_timeout_seconds: u64,
    pub embedding_dimension: usize,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if a numeric var fails to parse.
    pub fn from_env() -> Self {
        Self {
            similarity_threshold: parsed_env("SIMILARITY_THRESHOLD", 0.9),
            dedup_window_hours: parsed_env("DEDUP_WINDOW_HOURS", 24),
            dedup_top_k: parsed_env("DEDUP_TOP_K", 5),
            qdrant_url: env::var("QDRANT_URL").ok().filter(|v| !v.is_empty()),
            qdrant_api_key: env::var("QDRANT_API_KEY").ok().filter(|v| !v.is_empty()),
            qdrant_collection: env::var("QDRANT_COLLECTION")
                .unwrap_or_else(|_| "messages".to_string()),
            qdrant_distance: env::var("QDRANT_DISTANCE").unwrap_or_else(|_| "cosine".to_string()),
            qdrant_timeout_seconds: parsed_env("QDRANT_TIMEOUT_SECONDS", 10),
            embedding_dimension: parsed_env("EMBEDDING_DIMENSION", 1024),
        }
    }
}

fn parsed_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|_| panic!("{key} must be a number, got {raw:?}")),
        Err(_) => default,
    }
}
