use std::path::PathBuf;
use thiserror::Error;

/// Failures surfaced while reading scene and material documents
#[derive(Debug, Error)]
pub enum SceneError {
    /// A value in the document has the wrong shape, e.g. a color array with 4 elements
    #[error("Wrong format for '{key}': {message}")]
    ConfigFormat {
        key: String,
        message: String,
    },

    /// An operation was invoked on a resource that is not in a usable state
    #[error("{0}")]
    ResourceState(String),

    #[error("Missing node '{0}'")]
    MissingNode(String),

    #[error("Failed to parse scene document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl SceneError {
    pub fn format(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigFormat {
            key: key.into(),
            message: message.into(),
        }
    }
}
