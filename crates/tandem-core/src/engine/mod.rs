//! Reconciliation engine
//!
//! Moves changes between the local store and the remote API.
//!
//! ## Directions
//!
//! - Remote to local: every query result is upserted locally, remote
//!   values winning. Tombstoned ids are skipped. Records missing from the
//!   remote list are never deleted locally.
//! - Local to remote: records whose revision is ahead of the last
//!   acknowledged one are pushed (create if the remote never saw them,
//!   update otherwise); unpushed tombstones become deletes.
//!
//! Writes made by the remote-to-local direction are tagged
//! [`Origin::Remote`](crate::models::Origin) and never trigger a push.
//!
//! ## Failure handling
//!
//! Nothing is retried or rolled back. Entry points return [`SyncError`];
//! [`SyncEngine::dispatch`] and the background loop log and drop them.

mod error;
mod reconcile;
mod report;

pub use error::{SyncError, SyncResult};
pub use reconcile::{Intent, SyncEngine, SyncOptions};
pub use report::SyncReport;
