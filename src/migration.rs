//! The migration unit contract.
//!
//! A migration is anything with a stable id, a create date for ordering, and
//! a side-effecting execute step. The two optional capabilities mirror the
//! kinds of units the runner distinguishes: contextual units (`contexts`
//! returns `Some`) and always-run units.
use crate::store::DocumentStore;
use chrono::{DateTime, Utc};

pub trait Migration: Send + Sync {
    /// Caller-assigned id, unique across all discovered migrations.
    fn id(&self) -> &str;

    /// Human-readable name recorded in the version ledger.
    fn name(&self) -> &str;

    /// Ordering key; ties keep discovery order.
    fn created_at(&self) -> DateTime<Utc>;

    /// The migration's own work. May touch any collection and may fail.
    fn execute(&self, store: &dyn DocumentStore) -> anyhow::Result<()>;

    /// Declared contexts. `Some` marks the migration contextual; an empty
    /// set is a configuration error surfaced by the runner.
    fn contexts(&self) -> Option<&[String]> {
        None
    }

    /// Always-run migrations re-execute on every run regardless of ledger
    /// state.
    fn run_always(&self) -> bool {
        false
    }
}

impl std::fmt::Debug for dyn Migration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Migration")
            .field("id", &self.id())
            .field("name", &self.name())
            .finish()
    }
}

/// Stable identity hash of a migration id. This digest, not the raw id, is
/// what the ledger and duplicate detection key on.
pub fn migration_hash(id: &str) -> String {
    format!("{:x}", md5::compute(id))
}
