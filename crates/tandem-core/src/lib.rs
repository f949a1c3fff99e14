//! Tandem Core Library
//!
//! This crate provides the core functionality for Tandem, an offline-first
//! todo list that keeps a local SQLite store reconciled with a remote
//! GraphQL API.
//!
//! # Architecture
//!
//! - **SQLite**: local source for everything shown to the user; writes land
//!   here first
//! - **GraphQL**: remote copy, polled while online and updated by
//!   mutations
//!
//! The [`SyncEngine`] moves changes between the two, depending on what
//! the [`ConnectivityMonitor`] reports.
//!
//! # Quick Start
//!
//! ```text
//! let session = Session::open(Config::load()?).await?;
//!
//! // Add a todo (remote-first when online, local-only when offline)
//! session.engine().add_todo("buy milk").await?;
//!
//! // Query the local list
//! let todos = session.engine().store().find().await?;
//! ```
//!
//! # Modules
//!
//! - `session`: wires the components together (main entry point)
//! - `models`: todo, tombstone and sync metadata
//! - `storage`: SQLite local store with change notifications
//! - `remote`: GraphQL transport, query cache and poller
//! - `connectivity`: online/offline signal
//! - `engine`: reconciliation between local and remote
//! - `config`: application configuration

pub mod config;
pub mod connectivity;
pub mod engine;
pub mod models;
pub mod remote;
pub mod session;
pub mod storage;

pub use config::Config;
pub use connectivity::ConnectivityMonitor;
pub use engine::{Intent, SyncEngine, SyncError, SyncOptions, SyncReport};
pub use models::{LocalTodo, Origin, Todo, TodoPatch, Tombstone};
pub use remote::{GraphqlRemote, NetworkStatus, QueryClient, QueryState, RemoteError, TodoRemote};
pub use session::Session;
pub use storage::{LocalStore, StorageError};
