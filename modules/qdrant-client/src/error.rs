use thiserror::Error;

pub type Result<T> = std::result::Result<T, QdrantError>;

#[derive(Debug, Error)]
pub enum QdrantError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Unexpected response shape: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for QdrantError {
    fn from(err: reqwest::Error) -> Self {
        QdrantError::Network(err.to_string())
    }
}
