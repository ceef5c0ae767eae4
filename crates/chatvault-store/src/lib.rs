//! # chatvault-store
//!
//! Read-only access to a decrypted chat-backup database.
//!
//! The crate exposes a synchronous [`Database`] handle that wraps a
//! read-only `rusqlite::Connection` and provides typed readers for every
//! table the archive engine consumes. [`Database::load_snapshot`] pulls all
//! of them into a [`Snapshot`] in one pass.

pub mod chats;
pub mod database;
pub mod jids;
pub mod media;
pub mod messages;
pub mod models;
pub mod polls;
pub mod reactions;
pub mod receipts;
pub mod schema;
pub mod snapshot;

mod error;

pub use database::Database;
pub use error::{Result, StoreError};
pub use models::*;
pub use snapshot::Snapshot;
