// CamTrawl Metadata Error Types

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("Metadata database not found: {0}")]
    StoreNotFound(PathBuf),

    #[error("Metadata database already exists: {0}")]
    StoreExists(PathBuf),

    /// Returned by every operation that needs a deployment while none is open.
    #[error("No deployment is open")]
    NotOpen,

    #[error("Schema statement failed ({statement}): {source}")]
    Schema {
        statement: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unknown camera: {0}")]
    UnknownCamera(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Decode error: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MetadataError {
    /// True when the error is the "no deployment open" outcome.
    pub fn is_not_open(&self) -> bool {
        matches!(self, MetadataError::NotOpen)
    }
}

pub type Result<T> = std::result::Result<T, MetadataError>;
