//! Storage error handling
//!
//! Provides typed errors for local store operations with descriptive
//! messages and recovery suggestions.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during local store operations
#[derive(Error, Debug)]
pub enum StorageError {
    /// Record rejected by the collection schema
    #[error("Validation failed for {collection}: {details}")]
    Validation {
        collection: &'static str,
        details: String,
    },

    /// No record with the given identifier
    #[error("No {collection} record with id '{id}'")]
    NotFound { collection: &'static str, id: String },

    /// Insert of an identifier that already exists
    #[error("A {collection} record with id '{id}' already exists")]
    Duplicate { collection: &'static str, id: String },

    /// Failed to create data directory
    #[error("Failed to create data directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Permission denied accessing path
    #[error("Permission denied: cannot access '{path}'. Check file permissions.")]
    PermissionDenied {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// SQLite database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Generic I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl StorageError {
    pub(crate) fn validation(collection: &'static str, details: impl Into<String>) -> Self {
        StorageError::Validation {
            collection,
            details: details.into(),
        }
    }

    /// Create an error from an I/O error raised while preparing `path`
    pub fn from_io(error: io::Error, path: PathBuf) -> Self {
        match error.kind() {
            io::ErrorKind::PermissionDenied => StorageError::PermissionDenied {
                path,
                source: error,
            },
            _ => StorageError::CreateDirectory {
                path,
                source: error,
            },
        }
    }

    /// Whether this error means the record does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }

    /// Get a recovery suggestion for this error
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            StorageError::PermissionDenied { .. } => {
                Some("Check file and directory permissions, or point TANDEM_DATA_DIR elsewhere.")
            }
            StorageError::CreateDirectory { .. } => {
                Some("Check that the parent directory exists and you have write permissions.")
            }
            StorageError::Database(_) => {
                Some("The local database may be damaged. Remove it to start fresh; remote todos will sync back.")
            }
            _ => None,
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_denied_classification() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let err = StorageError::from_io(io_err, PathBuf::from("/test/path"));

        assert!(matches!(err, StorageError::PermissionDenied { .. }));
        assert!(err.recovery_suggestion().is_some());
    }

    #[test]
    fn test_other_io_is_create_directory() {
        let io_err = io::Error::new(io::ErrorKind::Other, "read-only file system");
        let err = StorageError::from_io(io_err, PathBuf::from("/ro"));

        assert!(matches!(err, StorageError::CreateDirectory { .. }));
    }

    #[test]
    fn test_validation_display() {
        let err = StorageError::validation("todos", "id must not be empty");
        let msg = err.to_string();
        assert!(msg.contains("todos"));
        assert!(msg.contains("id must not be empty"));
        assert!(err.recovery_suggestion().is_none());
    }

    #[test]
    fn test_not_found() {
        let err = StorageError::NotFound {
            collection: "todos",
            id: "42".to_string(),
        };
        assert!(err.is_not_found());
        assert!(err.to_string().contains("'42'"));
    }
}
