//! Data models for Tandem
//!
//! Defines the todo record shared by the local store and the remote API,
//! the tombstone left behind by a local delete, and the sync metadata the
//! local store keeps alongside each todo.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A todo item
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Todo {
    /// Unique identifier (server-assigned, or timestamp-derived offline)
    pub id: String,
    /// Display name
    pub name: String,
    /// Completion flag
    pub done: bool,
}

impl Todo {
    /// Create a todo with an explicit identifier
    pub fn new(id: impl Into<String>, name: impl Into<String>, done: bool) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            done,
        }
    }

    /// Apply a partial update
    pub fn apply(&mut self, patch: &TodoPatch) {
        if let Some(ref name) = patch.name {
            self.name = name.clone();
        }
        if let Some(done) = patch.done {
            self.done = done;
        }
    }
}

/// Partial update for a todo
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TodoPatch {
    pub name: Option<String>,
    pub done: Option<bool>,
}

impl TodoPatch {
    /// Patch that only sets the completion flag
    pub fn done(done: bool) -> Self {
        Self {
            name: None,
            done: Some(done),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.done.is_none()
    }
}

/// Marker for a todo deleted locally
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tombstone {
    /// Identifier of the deleted todo
    pub id: String,
    /// Whether the remote delete has succeeded
    pub pushed: bool,
    /// When the local delete happened
    pub deleted_at: DateTime<Utc>,
}

/// Who wrote a local record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// A user action on this device
    Local,
    /// The remote-to-local sync
    Remote,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::Local => "local",
            Origin::Remote => "remote",
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Origin {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(Origin::Local),
            "remote" => Ok(Origin::Remote),
            other => Err(format!("unknown origin: {}", other)),
        }
    }
}

/// A todo as held by the local store, with its sync metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocalTodo {
    #[serde(flatten)]
    pub todo: Todo,
    /// Who last wrote the record
    pub origin: Origin,
    /// Incremented on every write
    pub revision: i64,
    /// Revision last acknowledged by the remote; `None` if never pushed
    pub synced_revision: Option<i64>,
}

impl LocalTodo {
    /// Whether the remote has ever seen this record
    pub fn has_remote_revision(&self) -> bool {
        self.synced_revision.is_some()
    }

    /// Whether local changes are waiting to be pushed
    pub fn is_pending(&self) -> bool {
        match self.synced_revision {
            None => true,
            Some(synced) => synced < self.revision,
        }
    }
}

/// Generate an identifier for a todo created while offline
///
/// Millisecond timestamp, matching what a browser's `Date.now()` yields.
pub fn offline_id(now: DateTime<Utc>) -> String {
    now.timestamp_millis().to_string()
}
