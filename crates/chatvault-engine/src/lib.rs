//! # chatvault-engine
//!
//! Builds a self-contained JSON archive from a loaded chat-backup snapshot.
//!
//! The stages run in a fixed order, each consuming the previous one's
//! output:
//!
//! - [`identity`] canonicalises every address into one [`Identity`] each
//! - [`index`] groups side-table rows by owning message
//! - [`normalize`] turns raw rows into [`NormalizedMessage`]s
//! - [`assemble`] buckets, orders and decorates chats
//! - [`serialize`] resolves replies and writes the [`Archive`]
//!
//! [`export::export`] drives the whole run and returns its [`RunSummary`].

pub mod archive;
pub mod assemble;
pub mod contacts;
pub mod export;
pub mod identity;
pub mod index;
pub mod normalize;
pub mod serialize;
pub mod summary;

mod error;

pub use archive::Archive;
pub use contacts::ContactDirectory;
pub use error::{EngineError, Result};
pub use export::{build_archive, export, ExportOptions};
pub use identity::{Identity, IdentityId, IdentityRef, IdentityResolver};
pub use normalize::NormalizedMessage;
pub use summary::{Outcome, RunSummary};
