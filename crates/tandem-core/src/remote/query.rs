//! Cached query client
//!
//! Keeps the last `listTodos` result in memory and publishes every state
//! change on a watch channel. Mutations never touch the cache directly:
//! each successful mutation triggers a full refetch instead.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, warn};

use super::error::RemoteResult;
use super::TodoRemote;
use crate::models::Todo;

/// What the query is currently doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkStatus {
    /// Never fetched
    Idle,
    /// First fetch in flight
    Loading,
    /// Refetch or poll in flight while cached data is shown
    Polling,
    /// Last fetch succeeded
    Ready,
    /// Last fetch failed
    Error,
}

impl NetworkStatus {
    /// Whether a request is in flight
    pub fn is_in_flight(&self) -> bool {
        matches!(self, NetworkStatus::Loading | NetworkStatus::Polling)
    }
}

/// Snapshot of the cached query
#[derive(Debug, Clone, PartialEq)]
pub struct QueryState {
    /// Last successful result (kept when a later fetch fails)
    pub data: Option<Vec<Todo>>,
    pub status: NetworkStatus,
    /// Message of the last failure, cleared on success
    pub error: Option<String>,
    /// When `data` was fetched
    pub fetched_at: Option<DateTime<Utc>>,
}

impl Default for QueryState {
    fn default() -> Self {
        Self {
            data: None,
            status: NetworkStatus::Idle,
            error: None,
            fetched_at: None,
        }
    }
}

/// Query/mutation client with an in-memory response cache
#[derive(Clone)]
pub struct QueryClient {
    remote: Arc<dyn TodoRemote>,
    state: Arc<watch::Sender<QueryState>>,
}

impl QueryClient {
    pub fn new(remote: Arc<dyn TodoRemote>) -> Self {
        let (state, _) = watch::channel(QueryState::default());
        Self {
            remote,
            state: Arc::new(state),
        }
    }

    /// Current state
    pub fn state(&self) -> QueryState {
        self.state.borrow().clone()
    }

    /// Cached list, if any fetch has succeeded
    pub fn cached(&self) -> Option<Vec<Todo>> {
        self.state.borrow().data.clone()
    }

    /// Subscribe to state changes
    pub fn subscribe(&self) -> watch::Receiver<QueryState> {
        self.state.subscribe()
    }

    /// Initial load: served from the cache when one exists
    pub async fn query(&self) -> RemoteResult<Vec<Todo>> {
        if let Some(cached) = self.cached() {
            return Ok(cached);
        }
        self.refetch().await
    }

    /// Fetch the full list from the server, bypassing the cache
    pub async fn refetch(&self) -> RemoteResult<Vec<Todo>> {
        self.state.send_modify(|state| {
            state.status = if state.data.is_some() {
                NetworkStatus::Polling
            } else {
                NetworkStatus::Loading
            };
        });

        match self.remote.list_todos().await {
            Ok(todos) => {
                debug!("Fetched {} remote todos", todos.len());
                self.state.send_modify(|state| {
                    state.data = Some(todos.clone());
                    state.status = NetworkStatus::Ready;
                    state.error = None;
                    state.fetched_at = Some(Utc::now());
                });
                Ok(todos)
            }
            Err(e) => {
                warn!("GraphQL query error: {}", e);
                self.state.send_modify(|state| {
                    state.status = NetworkStatus::Error;
                    state.error = Some(e.to_string());
                });
                Err(e)
            }
        }
    }

    async fn refetch_after_mutation(&self) {
        if let Err(e) = self.refetch().await {
            warn!("Refetch after mutation failed: {}", e);
        }
    }

    /// Create a todo, then refetch
    pub async fn create_todo(&self, name: &str, done: bool) -> RemoteResult<Todo> {
        let created = self.remote.create_todo(name, done).await.map_err(|e| {
            warn!("GraphQL mutation error: {}", e);
            e
        })?;
        self.refetch_after_mutation().await;
        Ok(created)
    }

    /// Update a todo's completion flag, then refetch
    pub async fn update_todo(&self, id: &str, done: bool) -> RemoteResult<String> {
        let updated = self.remote.update_todo(id, done).await.map_err(|e| {
            warn!("GraphQL mutation error: {}", e);
            e
        })?;
        self.refetch_after_mutation().await;
        Ok(updated)
    }

    /// Delete a todo, then refetch
    pub async fn delete_todo(&self, id: &str) -> RemoteResult<String> {
        let deleted = self.remote.delete_todo(id).await.map_err(|e| {
            warn!("GraphQL mutation error: {}", e);
            e
        })?;
        self.refetch_after_mutation().await;
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::testing::FakeRemote;

    fn client_with(fake: &Arc<FakeRemote>) -> QueryClient {
        QueryClient::new(fake.clone())
    }

    #[tokio::test]
    async fn test_query_populates_cache() {
        let fake = Arc::new(FakeRemote::with_todos(vec![Todo::new("1", "walk", false)]));
        let client = client_with(&fake);
        assert_eq!(client.state().status, NetworkStatus::Idle);
        assert!(client.cached().is_none());

        let todos = client.query().await.unwrap();

        assert_eq!(todos.len(), 1);
        let state = client.state();
        assert_eq!(state.status, NetworkStatus::Ready);
        assert_eq!(state.data, Some(todos));
        assert!(state.fetched_at.is_some());

        // Second query is a cache hit
        client.query().await.unwrap();
        assert_eq!(fake.list_calls(), 1);
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_stale_data() {
        let fake = Arc::new(FakeRemote::with_todos(vec![Todo::new("1", "walk", false)]));
        let client = client_with(&fake);
        client.query().await.unwrap();

        fake.set_failing(true);
        assert!(client.refetch().await.is_err());

        let state = client.state();
        assert_eq!(state.status, NetworkStatus::Error);
        assert!(state.error.is_some());
        assert_eq!(state.data.map(|d| d.len()), Some(1));

        fake.set_failing(false);
        client.refetch().await.unwrap();
        assert!(client.state().error.is_none());
    }

    #[tokio::test]
    async fn test_mutations_refetch() {
        let fake = Arc::new(FakeRemote::new());
        let client = client_with(&fake);

        let created = client.create_todo("buy milk", false).await.unwrap();
        assert_eq!(fake.list_calls(), 1);
        assert_eq!(client.cached(), Some(vec![created.clone()]));

        client.update_todo(&created.id, true).await.unwrap();
        assert_eq!(fake.list_calls(), 2);
        assert_eq!(client.cached().unwrap()[0].done, true);

        client.delete_todo(&created.id).await.unwrap();
        assert_eq!(fake.list_calls(), 3);
        assert_eq!(client.cached(), Some(vec![]));
    }

    #[tokio::test]
    async fn test_failed_mutation_does_not_refetch() {
        let fake = Arc::new(FakeRemote::new());
        let client = client_with(&fake);
        fake.set_failing(true);

        assert!(client.create_todo("x", false).await.is_err());
        assert_eq!(fake.list_calls(), 0);
        assert_eq!(client.state().status, NetworkStatus::Idle);
    }

    #[tokio::test]
    async fn test_subscribers_see_results() {
        let fake = Arc::new(FakeRemote::with_todos(vec![Todo::new("1", "walk", false)]));
        let client = client_with(&fake);
        let mut rx = client.subscribe();

        client.refetch().await.unwrap();

        rx.changed().await.unwrap();
        let state = rx.borrow_and_update().clone();
        assert_eq!(state.status, NetworkStatus::Ready);
        assert!(!state.status.is_in_flight());
    }
}
