use thiserror::Error;

pub type Result<T> = std::result::Result<T, WatchdogError>;

#[derive(Error, Debug)]
pub enum WatchdogError {
    #[error("Missing credential: {0}")]
    MissingCredential(String),

    #[error("{origin} unavailable: {detail}")]
    TransientSource { origin: String, detail: String },

    #[error("Failed to parse {what}: {detail}")]
    Parse { what: String, detail: String },

    #[error("Failed to persist {target}: {detail}")]
    Persistence { target: String, detail: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl WatchdogError {
    pub fn transient(origin: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::TransientSource {
            origin: origin.into(),
            detail: detail.into(),
        }
    }
}
