use std::path::PathBuf;

use thiserror::Error;

/// Snapshot-level failures. Any of these aborts the run before output.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error, including "file is not a database".
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Generic I/O error while locating the snapshot.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The snapshot path does not point at a file.
    #[error("Snapshot not found at {}", .0.display())]
    SnapshotNotFound(PathBuf),

    /// A table the archive cannot be built without is missing.
    #[error("Snapshot is missing required table `{0}`")]
    MissingTable(&'static str),

    /// A present table lacks one of its key columns.
    #[error("Table `{table}` is missing key column `{column}`")]
    MissingColumn {
        table: &'static str,
        column: &'static str,
    },
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
