//! Storage layer
//!
//! Local, persistent half of the offline-first pair.
//!
//! ## Collections
//!
//! - `todos` - todo records plus sync metadata (origin, revisions)
//! - `tombstones` - identifiers deleted locally; block re-insertion from
//!   remote polls forever
//!
//! Records are validated against the collection schema before every write.

pub mod error;
pub mod local;
pub mod schema;
mod shared;

pub use error::{StorageError, StorageResult};
pub use local::{ChangeEvent, ChangeKind, LocalStore, UpsertOutcome};
pub use schema::{init_schema, needs_init, todo_from_document, SCHEMA_VERSION};
pub use shared::{is_initialized, shared};
