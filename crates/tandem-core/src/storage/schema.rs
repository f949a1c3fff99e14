//! SQLite schema and record validation for the local store
//!
//! Two collections are kept: `todos` and `tombstones`. Every write is
//! validated against the collection schema before it reaches SQLite.

use rusqlite::{Connection, Result};
use serde_json::Value;

use crate::models::Todo;
use crate::storage::error::{StorageError, StorageResult};

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Upper bound on primary key length
pub const MAX_ID_LENGTH: usize = 100;

pub const TODOS: &str = "todos";
pub const TOMBSTONES: &str = "tombstones";

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Schema version tracking
        CREATE TABLE IF NOT EXISTS schema_info (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        -- Todos, with sync metadata
        CREATE TABLE IF NOT EXISTS todos (
            id TEXT PRIMARY KEY CHECK (length(id) BETWEEN 1 AND 100),
            name TEXT NOT NULL,
            done INTEGER NOT NULL CHECK (done IN (0, 1)),
            origin TEXT NOT NULL DEFAULT 'local',
            revision INTEGER NOT NULL DEFAULT 1,
            synced_revision INTEGER
        );

        -- Identifiers deleted locally
        CREATE TABLE IF NOT EXISTS tombstones (
            id TEXT PRIMARY KEY CHECK (length(id) BETWEEN 1 AND 100),
            pushed INTEGER NOT NULL DEFAULT 0,
            deleted_at INTEGER NOT NULL
        );

        -- Pending sweep looks these up on every local change
        CREATE INDEX IF NOT EXISTS idx_todos_pending ON todos(synced_revision, revision);
        CREATE INDEX IF NOT EXISTS idx_tombstones_pushed ON tombstones(pushed);
        "#,
    )?;

    conn.execute(
        "INSERT OR REPLACE INTO schema_info (key, value) VALUES ('version', ?)",
        [SCHEMA_VERSION.to_string()],
    )?;

    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> Result<Option<i32>> {
    let mut stmt = conn.prepare("SELECT value FROM schema_info WHERE key = 'version'")?;
    let result: Result<String> = stmt.query_row([], |row| row.get(0));

    match result {
        Ok(version_str) => Ok(version_str.parse().ok()),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Check if schema needs initialization
pub fn needs_init(conn: &Connection) -> bool {
    let table_exists: bool = conn
        .prepare("SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_info'")
        .and_then(|mut stmt| stmt.exists([]))
        .unwrap_or(false);

    if !table_exists {
        return true;
    }

    match get_schema_version(conn) {
        Ok(Some(v)) => v < SCHEMA_VERSION,
        _ => true,
    }
}

/// Validate a primary key
pub fn validate_id(collection: &'static str, id: &str) -> StorageResult<()> {
    if id.is_empty() {
        return Err(StorageError::validation(collection, "id must not be empty"));
    }
    if id.chars().count() > MAX_ID_LENGTH {
        return Err(StorageError::validation(
            collection,
            format!("id exceeds {} characters", MAX_ID_LENGTH),
        ));
    }
    Ok(())
}

/// Validate a todo before it is written
pub fn validate_todo(todo: &Todo) -> StorageResult<()> {
    validate_id(TODOS, &todo.id)
}

/// Validate an untyped todo document and convert it
///
/// `id`, `name` and `done` are required and must have the right JSON type.
pub fn todo_from_document(doc: &Value) -> StorageResult<Todo> {
    let obj = doc
        .as_object()
        .ok_or_else(|| StorageError::validation(TODOS, "document must be an object"))?;

    let id = match obj.get("id") {
        Some(Value::String(s)) => s.clone(),
        Some(_) => return Err(StorageError::validation(TODOS, "id must be a string")),
        None => return Err(StorageError::validation(TODOS, "missing required field 'id'")),
    };
    let name = match obj.get("name") {
        Some(Value::String(s)) => s.clone(),
        Some(_) => return Err(StorageError::validation(TODOS, "name must be a string")),
        None => {
            return Err(StorageError::validation(
                TODOS,
                "missing required field 'name'",
            ))
        }
    };
    let done = match obj.get("done") {
        Some(Value::Bool(b)) => *b,
        Some(_) => return Err(StorageError::validation(TODOS, "done must be a boolean")),
        None => {
            return Err(StorageError::validation(
                TODOS,
                "missing required field 'done'",
            ))
        }
    };

    let todo = Todo { id, name, done };
    validate_todo(&todo)?;
    Ok(todo)
}
