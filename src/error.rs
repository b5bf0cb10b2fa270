//! Error taxonomy for the migration engine.
//!
//! Errors raised before the lock is taken propagate as-is; everything that
//! fails inside the locked critical section reaches callers wrapped in
//! [`MigrateError::Orchestration`] after the lock has been released.
use std::path::PathBuf;
use thiserror::Error;

/// Failures surfaced by a store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique index violation on '{collection}.{field}'")]
    UniqueViolation { collection: String, field: String },

    #[error("store I/O at {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed store data in {}", .path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("encode document")]
    Encode(#[source] serde_json::Error),
}

/// Everything the migration engine can fail with.
#[derive(Debug, Error)]
pub enum MigrateError {
    /// A source location did not resolve to a readable set of migrations.
    #[error("'{}' is no valid migration source ({reason})", .path.display())]
    InvalidSource { path: PathBuf, reason: String },

    /// Two discovered migrations share the same id hash.
    #[error("found a non unique migration id '{id}' in '{new}', already defined by migration '{existing}'")]
    DuplicateMigration {
        id: String,
        new: String,
        existing: String,
    },

    /// Another run currently holds the migration lock.
    #[error("concurrent migrations are not allowed")]
    LockHeld,

    /// A contextual migration declared an empty context set.
    #[error("an empty context specification is not allowed (migration '{unit}')")]
    EmptyContextSpecification { unit: String },

    /// A migration's own execute step failed.
    #[error("migration '{unit}' failed")]
    ExecutionFailed {
        unit: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The version editor was asked for an id no migration carries.
    #[error("no migration for id '{id}' found")]
    UnknownMigration { id: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Wrapper applied to any error raised inside the locked section.
    #[error("error while executing migrations")]
    Orchestration {
        #[source]
        source: Box<MigrateError>,
    },
}

impl MigrateError {
    /// The error beneath an [`MigrateError::Orchestration`] wrapper, if any.
    pub fn cause(&self) -> Option<&MigrateError> {
        match self {
            MigrateError::Orchestration { source } => Some(source),
            _ => None,
        }
    }
}
