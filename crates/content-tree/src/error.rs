use thiserror::Error;

pub type Result<T> = std::result::Result<T, ContentTreeError>;

#[derive(Error, Debug)]
pub enum ContentTreeError {
    #[error("Invalid path: {0:?}")]
    InvalidPath(String),

    #[error("Path conflict at {path:?}: {reason}")]
    PathConflict { path: String, reason: String },

    /// A stored hash does not match the hash recomputed from node content
    #[error("Tree consistency violation at {path:?}: stored {stored}, recomputed {recomputed}")]
    Consistency {
        path: String,
        stored: String,
        recomputed: String,
    },

    #[error("Corrupt snapshot: {0}")]
    Corrupt(String),

    #[error("Unsupported snapshot schema_version {found} (expected {expected})")]
    Schema { found: u32, expected: u32 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ContentTreeError {
    pub fn conflict(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PathConflict {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
