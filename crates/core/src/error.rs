use std::path::PathBuf;

use thiserror::Error;

use crate::types::StorageLocation;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Fetching {location} failed: {reason}")]
    FetchFailed {
        location: StorageLocation,
        reason: String,
    },

    #[error("Presigning {location} failed: {reason}")]
    PresignFailed {
        location: StorageLocation,
        reason: String,
    },

    #[error("Object not found: {location}")]
    NotFound { location: StorageLocation },

    #[error("Sidecar {location} does not name a media object (s3_bucket/s3_key missing)")]
    SidecarIncomplete { location: StorageLocation },

    #[error("Cache error at {path}: {source}")]
    Cache {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// A soft miss while walking a loosely shaped response. Never returned to
/// callers of the locator; only logged.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ShapeError {
    #[error("missing field `{0}`")]
    MissingField(&'static str),

    #[error("field `{field}` is not {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },

    #[error("unbalanced `{0}` in response text")]
    Unbalanced(char),

    #[error("malformed fragment: {0}")]
    Malformed(String),
}
