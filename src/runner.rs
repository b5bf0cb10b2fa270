//! The orchestration loop.
//!
//! Walks the registry in ledger order under the migration lock, applying the
//! per-unit policy: context filter first, then the already-ran check, then
//! execute-and-record. The first failure ends the run; the lock is released
//! either way.
use crate::error::MigrateError;
use crate::ledger::{self, LedgerEntry};
use crate::lock;
use crate::migration::Migration;
use crate::registry::{Registry, RegistryEntry};
use crate::store::DocumentStore;
use chrono::Utc;

/// What happened to one unit during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitStatus {
    Executed,
    /// Contextual unit whose declared contexts miss every requested one.
    SkippedNoContextMatch,
    /// Ledger already has an entry and the unit is not always-run.
    SkippedAlreadyRun,
    /// The unit raised; the run stops here.
    Failed,
}

/// Progress report, delivered exactly once per unit.
pub struct UnitReport<'a> {
    pub migration: &'a dyn Migration,
    pub status: UnitStatus,
    /// 1-based position in the run.
    pub position: usize,
    pub total: usize,
}

/// Execute all open migrations and return how many ran.
///
/// Fails with [`MigrateError::LockHeld`] when another run holds the lock;
/// every failure inside the locked section arrives wrapped in
/// [`MigrateError::Orchestration`] with the lock already released.
pub fn run(
    store: &dyn DocumentStore,
    registry: &Registry,
    requested_contexts: &[String],
    mut observer: impl FnMut(&UnitReport<'_>),
) -> Result<u64, MigrateError> {
    lock::with_lock(store, || {
        execute_all(store, registry, requested_contexts, &mut observer)
    })
}

fn execute_all(
    store: &dyn DocumentStore,
    registry: &Registry,
    requested_contexts: &[String],
    observer: &mut impl FnMut(&UnitReport<'_>),
) -> Result<u64, MigrateError> {
    ledger::ensure_schema(store)?;

    let total = registry.len();
    let mut executed = 0u64;
    for (index, entry) in registry.iter().enumerate() {
        let result = advance(store, entry, requested_contexts);
        let status = match &result {
            Ok(status) => *status,
            Err(_) => UnitStatus::Failed,
        };
        // One report per unit, whatever happened to it.
        observer(&UnitReport {
            migration: entry.migration.as_ref(),
            status,
            position: index + 1,
            total,
        });
        if result? == UnitStatus::Executed {
            executed += 1;
        }
    }
    tracing::info!(executed, "migration run finished");
    Ok(executed)
}

fn advance(
    store: &dyn DocumentStore,
    entry: &RegistryEntry,
    requested_contexts: &[String],
) -> Result<UnitStatus, MigrateError> {
    let migration = entry.migration.as_ref();

    if !requested_contexts.is_empty() {
        if let Some(declared) = migration.contexts() {
            if declared.is_empty() {
                return Err(MigrateError::EmptyContextSpecification {
                    unit: migration.name().to_string(),
                });
            }
            if !declared.iter().any(|c| requested_contexts.contains(c)) {
                tracing::debug!(migration = migration.name(), "skipped: no context match");
                return Ok(UnitStatus::SkippedNoContextMatch);
            }
        }
    }

    if !migration.run_always() && ledger::has_run(store, &entry.hash)? {
        tracing::debug!(migration = migration.name(), "skipped: already run");
        return Ok(UnitStatus::SkippedAlreadyRun);
    }

    migration
        .execute(store)
        .map_err(|source| MigrateError::ExecutionFailed {
            unit: migration.name().to_string(),
            source: source.into(),
        })?;
    ledger::record(
        store,
        &LedgerEntry::for_migration(&entry.hash, migration, Utc::now()),
    )?;
    tracing::debug!(migration = migration.name(), "executed");
    Ok(UnitStatus::Executed)
}
