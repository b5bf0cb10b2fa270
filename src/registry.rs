//! Discovery and ordering of migration units.
//!
//! Sources load in caller order, duplicates are a fatal discovery error, and
//! the result iterates by ascending create date with ties keeping discovery
//! order.
use crate::error::MigrateError;
use crate::migration::{migration_hash, Migration};
use crate::source::MigrationSource;
use std::collections::HashMap;

/// One discovered migration plus its identity hash.
#[derive(Debug)]
pub struct RegistryEntry {
    pub hash: String,
    pub migration: Box<dyn Migration>,
}

/// The ordered set of migrations for one run.
#[derive(Debug)]
pub struct Registry {
    entries: Vec<RegistryEntry>,
}

impl Registry {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegistryEntry> {
        self.entries.iter()
    }
}

/// Load every source in order and assemble the registry.
///
/// A second migration hashing to an already-registered id fails the whole
/// discovery, naming both the new and the previously registered migration.
pub fn discover(sources: &[Box<dyn MigrationSource>]) -> Result<Registry, MigrateError> {
    let mut entries: Vec<RegistryEntry> = Vec::new();
    let mut seen: HashMap<String, usize> = HashMap::new();

    for source in sources {
        tracing::debug!(source = %source.describe(), "loading migration source");
        for migration in source.load()? {
            let hash = migration_hash(migration.id());
            if let Some(&existing) = seen.get(&hash) {
                return Err(MigrateError::DuplicateMigration {
                    id: migration.id().to_string(),
                    new: migration.name().to_string(),
                    existing: entries[existing].migration.name().to_string(),
                });
            }
            seen.insert(hash.clone(), entries.len());
            entries.push(RegistryEntry { hash, migration });
        }
    }

    // Stable sort: equal create dates keep their discovery order.
    entries.sort_by_key(|entry| entry.migration.created_at());
    tracing::info!(count = entries.len(), "discovered migrations");
    Ok(Registry { entries })
}
