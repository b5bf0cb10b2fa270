//! Mutual exclusion for migration runs.
//!
//! A single lock document arbitrates between independent runs against the
//! same store. Acquisition is one atomic find-and-replace; release is
//! unconditional and runs on every exit path of the critical section.
use crate::error::MigrateError;
use crate::store::{Document, DocumentStore, Filter};
use chrono::Utc;
use serde_json::Value;

/// Wire name of the lock collection.
pub const LOCK_COLLECTION: &str = "DATABASE_MIGRATIONS_LOCK";

/// Take the migration lock or fail with [`MigrateError::LockHeld`].
///
/// The replace and the read of the previous holder are a single store call,
/// so two concurrent acquirers cannot both observe a free lock.
pub fn acquire(store: &dyn DocumentStore) -> Result<(), MigrateError> {
    store.ensure_index(LOCK_COLLECTION, "locked", false)?;

    let mut record = Document::new();
    record.insert("locked".to_string(), Value::Bool(true));
    record.insert(
        "last_locked_date".to_string(),
        Value::String(Utc::now().to_rfc3339()),
    );
    let previous =
        store.find_one_and_replace(LOCK_COLLECTION, &Filter::exists("locked"), record, true)?;

    if let Some(previous) = previous {
        if previous.get("locked") == Some(&Value::Bool(true)) {
            return Err(MigrateError::LockHeld);
        }
    }
    tracing::debug!("acquired migration lock");
    Ok(())
}

/// Flip the lock back to free. Never fails: a store error here is logged
/// and swallowed so it cannot mask the error that ended the run.
pub fn release(store: &dyn DocumentStore) {
    let mut fields = Document::new();
    fields.insert("locked".to_string(), Value::Bool(false));
    match store.update_one(LOCK_COLLECTION, &Filter::eq("locked", true), fields, false) {
        Ok(_) => tracing::debug!("released migration lock"),
        Err(error) => tracing::warn!(%error, "failed to release migration lock"),
    }
}

/// Out-of-band recovery: clear the lock regardless of current state,
/// creating the record when absent.
pub fn force_release(store: &dyn DocumentStore) -> Result<(), MigrateError> {
    let mut fields = Document::new();
    fields.insert("locked".to_string(), Value::Bool(false));
    store.update_one(LOCK_COLLECTION, &Filter::exists("locked"), fields, true)?;
    Ok(())
}

/// Run `body` under the migration lock.
///
/// The lock is released on every exit path before any error propagates, and
/// errors raised by `body` reach the caller wrapped in
/// [`MigrateError::Orchestration`]. Acquisition errors propagate unwrapped.
pub(crate) fn with_lock<T>(
    store: &dyn DocumentStore,
    body: impl FnOnce() -> Result<T, MigrateError>,
) -> Result<T, MigrateError> {
    acquire(store)?;
    let result = body();
    release(store);
    result.map_err(|source| MigrateError::Orchestration {
        source: Box::new(source),
    })
}
