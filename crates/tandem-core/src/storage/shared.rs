//! Process-wide local store handle
//!
//! The store is opened at most once per process. Every caller of
//! [`shared`] awaits the same initialization and receives a clone of the
//! same handle; callers then pass it on explicitly.

use tokio::sync::OnceCell;

use crate::config::Config;
use crate::storage::error::StorageResult;
use crate::storage::local::LocalStore;

static STORE: OnceCell<LocalStore> = OnceCell::const_new();

/// Get the shared store, opening it on first use
///
/// Only the first call's `config` is used. A failed open leaves the cell
/// empty so a later call can retry.
pub async fn shared(config: &Config) -> StorageResult<LocalStore> {
    let store = STORE
        .get_or_try_init(|| async { LocalStore::open(config) })
        .await?;
    Ok(store.clone())
}

/// Whether the shared store has been opened
pub fn is_initialized() -> bool {
    STORE.initialized()
}
