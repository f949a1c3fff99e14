//! Application wiring
//!
//! A `Session` owns one of each component, built from a [`Config`]:
//! the shared local store, the remote client (GraphQL when an endpoint
//! is configured), the connectivity monitor and the engine over them.
//!
//! ## Usage
//!
//! ```ignore
//! let session = Session::open(Config::load()?).await?;
//! session.engine().add_todo("buy milk").await?;
//! let poller = session.spawn_poller();
//! ```

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::info;

use crate::config::Config;
use crate::connectivity::ConnectivityMonitor;
use crate::engine::{SyncEngine, SyncOptions};
use crate::models::Todo;
use crate::remote::{
    spawn_poller, GraphqlRemote, PollerHandle, QueryClient, RemoteError, RemoteResult, TodoRemote,
};
use crate::storage::{self, LocalStore, StorageError};

/// Fully wired application state
pub struct Session {
    config: Config,
    engine: SyncEngine,
}

impl Session {
    /// Open the shared store and build the remaining components
    ///
    /// Without an endpoint the session starts offline and every remote
    /// call fails with [`RemoteError::NotConfigured`].
    pub async fn open(config: Config) -> Result<Self> {
        let store = storage::shared(&config).await.map_err(open_failure)?;
        Self::with_store(config, store)
    }

    /// Build a session over an already opened store
    pub fn with_store(config: Config, store: LocalStore) -> Result<Self> {
        let remote: Arc<dyn TodoRemote> = if config.has_remote() {
            Arc::new(
                GraphqlRemote::from_config(&config).context("Failed to create GraphQL client")?,
            )
        } else {
            info!("No endpoint configured, running local-only");
            Arc::new(Unconfigured)
        };

        let connectivity = ConnectivityMonitor::new(config.start_online && config.has_remote());
        let engine = SyncEngine::new(
            store,
            QueryClient::new(remote),
            connectivity,
            SyncOptions::from_config(&config),
        );

        Ok(Self { config, engine })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    /// Start background polling, if enabled
    pub fn spawn_poller(&self) -> Option<PollerHandle> {
        if !self.config.has_remote() {
            return None;
        }
        let interval = self.config.poll_interval()?;
        Some(spawn_poller(
            self.engine.remote().clone(),
            self.engine.connectivity().subscribe(),
            interval,
        ))
    }
}

/// Wrap a store-opening failure, adding what the user can do about it
fn open_failure(err: StorageError) -> anyhow::Error {
    let message = match err.recovery_suggestion() {
        Some(hint) => format!("Failed to open local store. {}", hint),
        None => "Failed to open local store".to_string(),
    };
    anyhow::Error::new(err).context(message)
}

/// Remote used when no endpoint is configured
struct Unconfigured;

#[async_trait]
impl TodoRemote for Unconfigured {
    async fn list_todos(&self) -> RemoteResult<Vec<Todo>> {
        Err(RemoteError::NotConfigured)
    }

    async fn create_todo(&self, _name: &str, _done: bool) -> RemoteResult<Todo> {
        Err(RemoteError::NotConfigured)
    }

    async fn update_todo(&self, _id: &str, _done: bool) -> RemoteResult<String> {
        Err(RemoteError::NotConfigured)
    }

    async fn delete_todo(&self, _id: &str) -> RemoteResult<String> {
        Err(RemoteError::NotConfigured)
    }
}
