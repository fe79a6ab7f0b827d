pub mod config;
pub mod error;
pub mod text;
pub mod types;

pub use config::Config;
pub use error::TelescopeError;
pub use text::{content_hash, normalize_text};
pub use types::*;
