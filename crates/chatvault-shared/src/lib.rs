//! # chatvault-shared
//!
//! Vocabulary shared by the snapshot reader and the archive engine: row
//! references, decoded status/kind codes and protocol constants.

pub mod constants;
pub mod types;

pub use types::{CallResult, DeliveryStatus, Direction, MessageKind, RowId};
