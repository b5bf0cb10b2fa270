//! Manual version ledger editing.
//!
//! Adds or deletes ledger entries without executing any migration, under the
//! same lock discipline as a normal run. Used for synchronizing the ledger
//! with an environment that is already in the target state.
use crate::error::MigrateError;
use crate::ledger::{self, LedgerEntry};
use crate::lock;
use crate::registry::{Registry, RegistryEntry};
use crate::store::DocumentStore;
use chrono::Utc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditMode {
    /// Write ledger entries as if the selected migrations had executed.
    Add,
    /// Remove the selected migrations' ledger entries.
    Delete,
}

/// Apply `mode` to every migration in the registry, or to the single one
/// whose id equals `only_id`. Returns the number of affected entries.
pub fn apply(
    store: &dyn DocumentStore,
    registry: &Registry,
    mode: EditMode,
    only_id: Option<&str>,
) -> Result<u64, MigrateError> {
    lock::with_lock(store, || edit(store, registry, mode, only_id))
}

fn edit(
    store: &dyn DocumentStore,
    registry: &Registry,
    mode: EditMode,
    only_id: Option<&str>,
) -> Result<u64, MigrateError> {
    let selected: Vec<&RegistryEntry> = match only_id {
        Some(id) => {
            let matches: Vec<&RegistryEntry> = registry
                .iter()
                .filter(|entry| entry.migration.id() == id)
                .collect();
            if matches.is_empty() {
                return Err(MigrateError::UnknownMigration { id: id.to_string() });
            }
            matches
        }
        None => registry.iter().collect(),
    };

    ledger::ensure_schema(store)?;
    for entry in &selected {
        match mode {
            EditMode::Add => ledger::record(
                store,
                &LedgerEntry::for_migration(&entry.hash, entry.migration.as_ref(), Utc::now()),
            )?,
            EditMode::Delete => ledger::remove(store, &entry.hash)?,
        }
    }
    tracing::info!(
        affected = selected.len(),
        mode = ?mode,
        "version ledger edited"
    );
    Ok(selected.len() as u64)
}
