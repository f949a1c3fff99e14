//! Remote data client
//!
//! Talks to the todo GraphQL API.
//!
//! - [`GraphqlRemote`]: raw transport, one HTTP request per operation
//! - [`QueryClient`]: cached `listTodos` result, refetch after every
//!   successful mutation, and a watch channel of [`QueryState`]
//! - [`spawn_poller`]: background refetch on a fixed interval while online
//!
//! The [`TodoRemote`] trait is the seam between the two layers, so the
//! reconciliation engine can run against any backend.

use async_trait::async_trait;

use crate::models::Todo;

mod error;
mod graphql;
mod poller;
mod query;
#[cfg(test)]
pub(crate) mod testing;

pub use error::{RemoteError, RemoteResult};
pub use graphql::GraphqlRemote;
pub use poller::{spawn_poller, PollerCommand, PollerHandle};
pub use query::{NetworkStatus, QueryClient, QueryState};

/// Operations exposed by the todo API
#[async_trait]
pub trait TodoRemote: Send + Sync {
    /// Full current list
    async fn list_todos(&self) -> RemoteResult<Vec<Todo>>;

    /// Create a todo; the server assigns the id
    async fn create_todo(&self, name: &str, done: bool) -> RemoteResult<Todo>;

    /// Set the completion flag, returning the id
    async fn update_todo(&self, id: &str, done: bool) -> RemoteResult<String>;

    /// Delete a todo, returning the id
    async fn delete_todo(&self, id: &str) -> RemoteResult<String>;
}
