use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum LauncherError {
    #[error("invalid resource identifier '{uri}': {reason}")]
    InvalidUri { uri: String, reason: String },

    #[error("{uri} has unknown or invalid mime-type {mime}")]
    NotAnImage { uri: String, mime: String },

    #[error("no images to process")]
    NoImages,

    #[error("{operation} failed: {source}")]
    Backend {
        operation: &'static str,
        #[source]
        source: BoxError,
    },

    #[error("run task returned no errors but produced no tasks")]
    NoTaskProduced,

    #[error("task {task_id} was submitted but waiting for it to stop failed: {source}")]
    Wait {
        task_id: String,
        #[source]
        source: BoxError,
    },

    #[error("wait for task {task_id} was cancelled")]
    WaitCancelled { task_id: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),
}

impl LauncherError {
    pub fn invalid_uri(uri: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUri {
            uri: uri.into(),
            reason: reason.into(),
        }
    }

    pub fn backend(operation: &'static str, source: impl Into<BoxError>) -> Self {
        Self::Backend {
            operation,
            source: source.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LauncherError>;
