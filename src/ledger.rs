//! The version ledger: one record per executed migration.
use crate::error::MigrateError;
use crate::migration::Migration;
use crate::store::{self, DocumentStore, Filter};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Wire name of the ledger collection.
pub const MIGRATIONS_COLLECTION: &str = "DATABASE_MIGRATIONS";

/// The persisted shape of one execution record. Upserted, never appended:
/// re-running an always-run migration overwrites its entry in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub migration_id: String,
    pub migration_class: String,
    pub last_execution_date: DateTime<Utc>,
    pub run_always: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contexts: Option<Vec<String>>,
}

impl LedgerEntry {
    /// The entry the orchestrator and the version editor both write.
    pub fn for_migration(hash: &str, migration: &dyn Migration, at: DateTime<Utc>) -> Self {
        Self {
            migration_id: hash.to_string(),
            migration_class: migration.name().to_string(),
            last_execution_date: at,
            run_always: migration.run_always(),
            contexts: migration.contexts().map(<[String]>::to_vec),
        }
    }
}

/// Idempotently create the unique index the ledger relies on.
pub fn ensure_schema(store: &dyn DocumentStore) -> Result<(), MigrateError> {
    store.ensure_index(MIGRATIONS_COLLECTION, "migration_id", true)?;
    Ok(())
}

/// Whether an entry exists for the given identity hash.
pub fn has_run(store: &dyn DocumentStore, hash: &str) -> Result<bool, MigrateError> {
    let count = store.count(MIGRATIONS_COLLECTION, &Filter::eq("migration_id", hash))?;
    Ok(count > 0)
}

/// Upsert the entry keyed by its migration id.
pub fn record(store: &dyn DocumentStore, entry: &LedgerEntry) -> Result<(), MigrateError> {
    let fields = store::to_document(entry)?;
    store.update_one(
        MIGRATIONS_COLLECTION,
        &Filter::eq("migration_id", entry.migration_id.clone()),
        fields,
        true,
    )?;
    Ok(())
}

/// Remove the entry for the given identity hash. No-op when absent.
pub fn remove(store: &dyn DocumentStore, hash: &str) -> Result<(), MigrateError> {
    store.delete_one(MIGRATIONS_COLLECTION, &Filter::eq("migration_id", hash))?;
    Ok(())
}

/// Read an entry back, mostly for tests and inspection.
pub fn find(store: &dyn DocumentStore, hash: &str) -> Result<Option<LedgerEntry>, MigrateError> {
    let Some(document) = store.find_one(MIGRATIONS_COLLECTION, &Filter::eq("migration_id", hash))?
    else {
        return Ok(None);
    };
    let entry = serde_json::from_value(serde_json::Value::Object(document))
        .map_err(crate::error::StoreError::Encode)?;
    Ok(Some(entry))
}
