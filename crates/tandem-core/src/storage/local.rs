//! SQLite-backed local store
//!
//! Holds the `todos` and `tombstones` collections and broadcasts a
//! [`ChangeEvent`] after every todo write. Each event carries the
//! [`Origin`] of the write so subscribers can tell user edits apart from
//! writes made by the remote-to-local sync.
//!
//! ## Concurrency
//!
//! One connection is shared behind an async mutex. Every call is a
//! suspension point; the two tombstone-sensitive operations
//! ([`LocalStore::remove_with_tombstone`] and
//! [`LocalStore::upsert_from_remote`]) each run in a single transaction,
//! so a poll racing a local delete can never resurrect the record.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tokio::sync::{broadcast, Mutex};
use tracing::debug;

use crate::config::Config;
use crate::models::{LocalTodo, Origin, Todo, TodoPatch, Tombstone};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::schema::{
    init_schema, needs_init, validate_id, validate_todo, TODOS, TOMBSTONES,
};

/// Capacity of the change notification channel
const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// Kind of write that produced a change notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
    Remove,
}

/// Emitted after every write to the `todos` collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub id: String,
    pub origin: Origin,
}

/// Result of applying a remote record locally
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// Record did not exist locally
    Inserted,
    /// Local fields were overwritten by remote fields
    Updated,
    /// Local record already matched
    Unchanged,
    /// Identifier is tombstoned, nothing written
    Tombstoned,
}

const SELECT_TODO: &str = "SELECT id, name, done, origin, revision, synced_revision FROM todos";

/// Handle to the local database
///
/// Cheap to clone; all clones share one connection and one change channel.
#[derive(Clone)]
pub struct LocalStore {
    conn: Arc<Mutex<Connection>>,
    changes: broadcast::Sender<ChangeEvent>,
    path: Option<PathBuf>,
}

impl LocalStore {
    /// Open or create the database described by `config`
    pub fn open(config: &Config) -> StorageResult<Self> {
        Self::open_path(&config.database_path())
    }

    /// Open or create the database at `path`
    pub fn open_path(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StorageError::from_io(e, parent.to_path_buf()))?;
        }

        let conn = Connection::open(path)?;
        if needs_init(&conn) {
            init_schema(&conn)?;
        }
        debug!("Opened local store at {:?}", path);

        Ok(Self::from_connection(conn, Some(path.to_path_buf())))
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self::from_connection(conn, None))
    }

    fn from_connection(conn: Connection, path: Option<PathBuf>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            conn: Arc::new(Mutex::new(conn)),
            changes,
            path,
        }
    }

    /// Database file path (`None` for in-memory stores)
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Subscribe to change notifications
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }

    fn notify(&self, kind: ChangeKind, id: &str, origin: Origin) {
        // No subscribers is fine
        let _ = self.changes.send(ChangeEvent {
            kind,
            id: id.to_string(),
            origin,
        });
    }

    // ==================== Todo Queries ====================

    /// All todos, ordered by id
    pub async fn find(&self) -> StorageResult<Vec<Todo>> {
        Ok(self
            .find_local()
            .await?
            .into_iter()
            .map(|local| local.todo)
            .collect())
    }

    /// All todos with their sync metadata
    pub async fn find_local(&self) -> StorageResult<Vec<LocalTodo>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!("{} ORDER BY id", SELECT_TODO))?;
        let rows = stmt
            .query_map([], row_to_local)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Get a todo by id
    pub async fn find_one(&self, id: &str) -> StorageResult<Option<Todo>> {
        Ok(self.find_one_local(id).await?.map(|local| local.todo))
    }

    /// Get a todo with its sync metadata
    pub async fn find_one_local(&self, id: &str) -> StorageResult<Option<LocalTodo>> {
        let conn = self.conn.lock().await;
        Ok(get_local(&conn, id)?)
    }

    /// Todos with changes the remote has not acknowledged
    pub async fn pending(&self) -> StorageResult<Vec<LocalTodo>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE synced_revision IS NULL OR synced_revision < revision ORDER BY id",
            SELECT_TODO
        ))?;
        let rows = stmt
            .query_map([], row_to_local)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Number of todos
    pub async fn count(&self) -> StorageResult<i64> {
        let conn = self.conn.lock().await;
        Ok(conn.query_row("SELECT COUNT(*) FROM todos", [], |row| row.get(0))?)
    }

    // ==================== Todo Writes ====================

    /// Insert a new todo written by the user
    ///
    /// Fails with [`StorageError::Duplicate`] if the id exists.
    pub async fn insert(&self, todo: &Todo) -> StorageResult<()> {
        self.insert_inner(todo, None).await
    }

    /// Insert a todo the remote already holds (created remote-first)
    pub async fn insert_synced(&self, todo: &Todo) -> StorageResult<()> {
        self.insert_inner(todo, Some(1)).await
    }

    async fn insert_inner(&self, todo: &Todo, synced_revision: Option<i64>) -> StorageResult<()> {
        validate_todo(todo)?;
        {
            let conn = self.conn.lock().await;
            if exists(&conn, &todo.id)? {
                return Err(StorageError::Duplicate {
                    collection: TODOS,
                    id: todo.id.clone(),
                });
            }
            conn.execute(
                "INSERT INTO todos (id, name, done, origin, revision, synced_revision)
                 VALUES (?1, ?2, ?3, ?4, 1, ?5)",
                params![
                    todo.id,
                    todo.name,
                    todo.done,
                    Origin::Local.as_str(),
                    synced_revision
                ],
            )?;
        }
        self.notify(ChangeKind::Insert, &todo.id, Origin::Local);
        Ok(())
    }

    /// Insert or replace a todo, keyed by id
    ///
    /// Counts as a local edit: the revision is bumped and the record becomes
    /// pending until pushed.
    pub async fn upsert(&self, todo: &Todo) -> StorageResult<()> {
        validate_todo(todo)?;
        let kind = {
            let mut conn = self.conn.lock().await;
            let tx = conn.transaction()?;
            let kind = match get_local(&tx, &todo.id)? {
                Some(existing) => {
                    tx.execute(
                        "UPDATE todos SET name = ?2, done = ?3, origin = ?4, revision = ?5
                         WHERE id = ?1",
                        params![
                            todo.id,
                            todo.name,
                            todo.done,
                            Origin::Local.as_str(),
                            existing.revision + 1
                        ],
                    )?;
                    ChangeKind::Update
                }
                None => {
                    tx.execute(
                        "INSERT INTO todos (id, name, done, origin, revision, synced_revision)
                         VALUES (?1, ?2, ?3, ?4, 1, NULL)",
                        params![todo.id, todo.name, todo.done, Origin::Local.as_str()],
                    )?;
                    ChangeKind::Insert
                }
            };
            tx.commit()?;
            kind
        };
        self.notify(kind, &todo.id, Origin::Local);
        Ok(())
    }

    /// Apply a record received from the remote
    ///
    /// Remote fields overwrite local ones and the record is marked synced.
    /// With `respect_tombstones`, a tombstoned id is left alone. The check
    /// and the write share one transaction.
    pub async fn upsert_from_remote(
        &self,
        todo: &Todo,
        respect_tombstones: bool,
    ) -> StorageResult<UpsertOutcome> {
        validate_todo(todo)?;
        let outcome = {
            let mut conn = self.conn.lock().await;
            let tx = conn.transaction()?;

            if respect_tombstones && tombstone_exists(&tx, &todo.id)? {
                return Ok(UpsertOutcome::Tombstoned);
            }

            let outcome = match get_local(&tx, &todo.id)? {
                Some(existing) if existing.todo == *todo => {
                    if existing.is_pending() {
                        // Remote already agrees with the local edit
                        tx.execute(
                            "UPDATE todos SET synced_revision = revision WHERE id = ?1",
                            params![todo.id],
                        )?;
                    }
                    UpsertOutcome::Unchanged
                }
                Some(existing) => {
                    let revision = existing.revision + 1;
                    tx.execute(
                        "UPDATE todos SET name = ?2, done = ?3, origin = ?4,
                             revision = ?5, synced_revision = ?5
                         WHERE id = ?1",
                        params![
                            todo.id,
                            todo.name,
                            todo.done,
                            Origin::Remote.as_str(),
                            revision
                        ],
                    )?;
                    UpsertOutcome::Updated
                }
                None => {
                    tx.execute(
                        "INSERT INTO todos (id, name, done, origin, revision, synced_revision)
                         VALUES (?1, ?2, ?3, ?4, 1, 1)",
                        params![todo.id, todo.name, todo.done, Origin::Remote.as_str()],
                    )?;
                    UpsertOutcome::Inserted
                }
            };
            tx.commit()?;
            outcome
        };

        match outcome {
            UpsertOutcome::Inserted => self.notify(ChangeKind::Insert, &todo.id, Origin::Remote),
            UpsertOutcome::Updated => self.notify(ChangeKind::Update, &todo.id, Origin::Remote),
            UpsertOutcome::Unchanged | UpsertOutcome::Tombstoned => {}
        }
        Ok(outcome)
    }

    /// Patch fields of an existing todo, returning the record as written
    ///
    /// The returned revision is the one stored by this write.
    pub async fn patch(&self, id: &str, patch: &TodoPatch) -> StorageResult<LocalTodo> {
        let updated = {
            let mut conn = self.conn.lock().await;
            let tx = conn.transaction()?;
            let mut existing = get_local(&tx, id)?.ok_or_else(|| StorageError::NotFound {
                collection: TODOS,
                id: id.to_string(),
            })?;
            existing.todo.apply(patch);
            existing.origin = Origin::Local;
            existing.revision += 1;
            tx.execute(
                "UPDATE todos SET name = ?2, done = ?3, origin = ?4, revision = ?5 WHERE id = ?1",
                params![
                    id,
                    existing.todo.name,
                    existing.todo.done,
                    existing.origin.as_str(),
                    existing.revision
                ],
            )?;
            tx.commit()?;
            existing
        };
        self.notify(ChangeKind::Update, id, Origin::Local);
        Ok(updated)
    }

    /// Remove a todo, returning the removed record
    pub async fn remove(&self, id: &str) -> StorageResult<Todo> {
        let removed = {
            let conn = self.conn.lock().await;
            let existing = get_local(&conn, id)?.ok_or_else(|| StorageError::NotFound {
                collection: TODOS,
                id: id.to_string(),
            })?;
            conn.execute("DELETE FROM todos WHERE id = ?1", params![id])?;
            existing.todo
        };
        self.notify(ChangeKind::Remove, id, Origin::Local);
        Ok(removed)
    }

    /// Remove a todo and record a tombstone for it, atomically
    pub async fn remove_with_tombstone(&self, id: &str) -> StorageResult<Todo> {
        let removed = {
            let mut conn = self.conn.lock().await;
            let tx = conn.transaction()?;
            let existing = get_local(&tx, id)?.ok_or_else(|| StorageError::NotFound {
                collection: TODOS,
                id: id.to_string(),
            })?;
            tx.execute("DELETE FROM todos WHERE id = ?1", params![id])?;
            insert_tombstone(&tx, id)?;
            tx.commit()?;
            existing.todo
        };
        self.notify(ChangeKind::Remove, id, Origin::Local);
        Ok(removed)
    }

    /// Record that the remote acknowledged `revision` of a todo
    ///
    /// Returns false if the record no longer exists.
    pub async fn mark_synced(&self, id: &str, revision: i64) -> StorageResult<bool> {
        let conn = self.conn.lock().await;
        let changed = conn.execute(
            "UPDATE todos SET synced_revision = ?2
             WHERE id = ?1 AND (synced_revision IS NULL OR synced_revision < ?2)",
            params![id, revision],
        )?;
        Ok(changed > 0)
    }

    // ==================== Tombstones ====================

    /// Record a tombstone for `id` (no-op if one exists)
    pub async fn add_tombstone(&self, id: &str) -> StorageResult<()> {
        validate_id(TOMBSTONES, id)?;
        let conn = self.conn.lock().await;
        insert_tombstone(&conn, id)?;
        Ok(())
    }

    /// Whether `id` has been deleted locally
    pub async fn has_tombstone(&self, id: &str) -> StorageResult<bool> {
        let conn = self.conn.lock().await;
        Ok(tombstone_exists(&conn, id)?)
    }

    /// All tombstones, ordered by id
    pub async fn tombstones(&self) -> StorageResult<Vec<Tombstone>> {
        self.query_tombstones("SELECT id, pushed, deleted_at FROM tombstones ORDER BY id")
            .await
    }

    /// Tombstones whose remote delete has not succeeded yet
    pub async fn unpushed_tombstones(&self) -> StorageResult<Vec<Tombstone>> {
        self.query_tombstones(
            "SELECT id, pushed, deleted_at FROM tombstones WHERE pushed = 0 ORDER BY id",
        )
        .await
    }

    async fn query_tombstones(&self, sql: &str) -> StorageResult<Vec<Tombstone>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map([], |row| {
                let deleted_at: i64 = row.get(2)?;
                Ok(Tombstone {
                    id: row.get(0)?,
                    pushed: row.get(1)?,
                    deleted_at: DateTime::<Utc>::from_timestamp_millis(deleted_at)
                        .unwrap_or_default(),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Mark a tombstone's remote delete as done
    pub async fn mark_tombstone_pushed(&self, id: &str) -> StorageResult<()> {
        let conn = self.conn.lock().await;
        let changed = conn.execute(
            "UPDATE tombstones SET pushed = 1 WHERE id = ?1",
            params![id],
        )?;
        if changed == 0 {
            return Err(StorageError::NotFound {
                collection: TOMBSTONES,
                id: id.to_string(),
            });
        }
        Ok(())
    }
}

fn row_to_local(row: &Row<'_>) -> rusqlite::Result<LocalTodo> {
    let origin: String = row.get(3)?;
    let origin = origin.parse::<Origin>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, e.into())
    })?;
    Ok(LocalTodo {
        todo: Todo {
            id: row.get(0)?,
            name: row.get(1)?,
            done: row.get(2)?,
        },
        origin,
        revision: row.get(4)?,
        synced_revision: row.get(5)?,
    })
}

fn get_local(conn: &Connection, id: &str) -> rusqlite::Result<Option<LocalTodo>> {
    conn.query_row(
        &format!("{} WHERE id = ?1", SELECT_TODO),
        params![id],
        row_to_local,
    )
    .optional()
}

fn exists(conn: &Connection, id: &str) -> rusqlite::Result<bool> {
    conn.prepare("SELECT 1 FROM todos WHERE id = ?1")?
        .exists(params![id])
}

fn tombstone_exists(conn: &Connection, id: &str) -> rusqlite::Result<bool> {
    conn.prepare("SELECT 1 FROM tombstones WHERE id = ?1")?
        .exists(params![id])
}

fn insert_tombstone(conn: &Connection, id: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO tombstones (id, pushed, deleted_at) VALUES (?1, 0, ?2)",
        params![id, Utc::now().timestamp_millis()],
    )?;
    Ok(())
}
