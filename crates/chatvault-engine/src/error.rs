use std::path::PathBuf;

use chatvault_store::StoreError;
use thiserror::Error;

/// Fatal failures of an export run. Nothing is written when one occurs.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The snapshot could not be opened or read.
    #[error("Snapshot error: {0}")]
    Store(#[from] StoreError),

    /// The contact directory file exists but is unusable.
    #[error("Contact directory {}: {reason}", path.display())]
    ContactDirectory { path: PathBuf, reason: String },

    /// Rendering the archive failed.
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Writing the temporary archive file failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Moving the finished archive into place failed.
    #[error("Failed to persist archive to {}: {source}", path.display())]
    Persist {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, EngineError>;
