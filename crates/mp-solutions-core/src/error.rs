//! crate level errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Remote fetch failed or left an empty/unreadable file behind.
    #[error("Asset {path} unavailable: {reason}")]
    AssetUnavailable { path: String, reason: String },
    /// Logical asset path that would escape the cache root.
    #[error("Invalid asset path: {0}")]
    InvalidAssetPath(String),
    /// Missing side input, unparsable descriptor, or bad output names.
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// Runtime fault reported by the graph engine.
    #[error("Execution error: {0}")]
    Execution(String),
}

impl Error {
    pub(crate) fn unavailable(path: impl Into<String>, reason: impl ToString) -> Self {
        Self::AssetUnavailable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
