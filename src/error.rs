use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatewatchError {
    #[error("Failed to read expectations store from {path}")]
    StoreRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Expectations store {path} is corrupted or not valid JSON")]
    StoreParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write expectations store to {path}")]
    StoreWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Target does not exist: {0}")]
    MissingTarget(PathBuf),

    #[error("Assessment of {path} succeeded but reported no originator")]
    MissingOriginator { path: PathBuf },

    #[error("Stored originator pattern {pattern:?} is not a valid expression")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Home directory could not be determined (needed to expand {0:?})")]
    HomeDirUnavailable(String),

    #[error("Path error: {0}")]
    Path(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, GatewatchError>;
