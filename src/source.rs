//! Migration sources.
//!
//! A source turns one location into a list of capability-tagged migrations.
//! Load order within a source is stable across calls; the registry relies on
//! that for tie-breaking equal create dates.
use crate::error::MigrateError;
use crate::migration::Migration;
use crate::script::ScriptMigration;
use std::path::PathBuf;
use walkdir::WalkDir;

pub trait MigrationSource {
    /// Label used in logs and error messages.
    fn describe(&self) -> String;

    /// Produce the migrations this source contains, in stable order.
    fn load(&self) -> Result<Vec<Box<dyn Migration>>, MigrateError>;
}

/// A directory tree of `*.json` migration scripts. Files are visited in
/// lexicographic path order; anything without a `.json` extension is
/// ignored.
pub struct ScriptDirectory {
    root: PathBuf,
}

impl ScriptDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl MigrationSource for ScriptDirectory {
    fn describe(&self) -> String {
        self.root.display().to_string()
    }

    fn load(&self) -> Result<Vec<Box<dyn Migration>>, MigrateError> {
        if !self.root.is_dir() {
            return Err(MigrateError::InvalidSource {
                path: self.root.clone(),
                reason: "not a directory".to_string(),
            });
        }

        let mut migrations: Vec<Box<dyn Migration>> = Vec::new();
        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = entry.map_err(|err| MigrateError::InvalidSource {
                path: self.root.clone(),
                reason: format!("unreadable entry: {err}"),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            tracing::debug!(script = %path.display(), "loading migration script");
            migrations.push(Box::new(ScriptMigration::from_path(path)?));
        }
        Ok(migrations)
    }
}

/// Migrations registered in code. Factories run on every `load`, so each
/// discovery pass gets fresh instances.
pub struct InlineSource {
    label: String,
    factories: Vec<Box<dyn Fn() -> Box<dyn Migration> + Send + Sync>>,
}

impl InlineSource {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            factories: Vec::new(),
        }
    }

    #[must_use]
    pub fn with<M, F>(mut self, factory: F) -> Self
    where
        M: Migration + 'static,
        F: Fn() -> M + Send + Sync + 'static,
    {
        self.factories
            .push(Box::new(move || Box::new(factory()) as Box<dyn Migration>));
        self
    }
}

impl MigrationSource for InlineSource {
    fn describe(&self) -> String {
        self.label.clone()
    }

    fn load(&self) -> Result<Vec<Box<dyn Migration>>, MigrateError> {
        Ok(self.factories.iter().map(|factory| factory()).collect())
    }
}

/// Convenience: wrap CLI directory arguments as script sources.
pub fn script_sources(directories: &[PathBuf]) -> Vec<Box<dyn MigrationSource>> {
    directories
        .iter()
        .map(|dir| Box::new(ScriptDirectory::new(dir.clone())) as Box<dyn MigrationSource>)
        .collect()
}
