use thiserror::Error;

#[derive(Error, Debug)]
pub enum TelescopeError {
    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Vector index error: {0}")]
    Index(String),

    /// Integration bug (e.g. malformed metadata from the vector backend).
    /// Surfaced as a hard failure, never retried or degraded around.
    #[error("Contract violation: {0}")]
    Contract(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
