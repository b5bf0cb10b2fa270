//! Shared fixtures for the engine's unit tests.
use crate::migration::Migration;
use crate::source::{InlineSource, MigrationSource};
use crate::store::{Document, DocumentStore, Filter};
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Collection fake migrations write into, so tests can observe execution.
pub(crate) const APPLIED: &str = "applied";

#[derive(Clone)]
pub(crate) struct FakeMigration {
    id: String,
    name: String,
    created_at: DateTime<Utc>,
    contexts: Option<Vec<String>>,
    run_always: bool,
    fail: bool,
}

impl FakeMigration {
    pub fn new(id: &str, created_at: &str) -> Self {
        Self {
            id: id.to_string(),
            name: format!("Fake({id})"),
            created_at: created_at.parse().expect("fixture timestamp"),
            contexts: None,
            run_always: false,
            fail: false,
        }
    }

    pub fn in_contexts(mut self, contexts: &[&str]) -> Self {
        self.contexts = Some(contexts.iter().map(|c| c.to_string()).collect());
        self
    }

    pub fn always(mut self) -> Self {
        self.run_always = true;
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }
}

impl Migration for FakeMigration {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn execute(&self, store: &dyn DocumentStore) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("{} exploded", self.name);
        }
        let mut record = Document::new();
        record.insert("migration".to_string(), Value::String(self.id.clone()));
        store.insert_one(APPLIED, record)?;
        Ok(())
    }

    fn contexts(&self) -> Option<&[String]> {
        self.contexts.as_deref()
    }

    fn run_always(&self) -> bool {
        self.run_always
    }
}

/// Wrap fixtures as a single discovery source.
pub(crate) fn source_of(migrations: Vec<FakeMigration>) -> Vec<Box<dyn MigrationSource>> {
    let mut source = InlineSource::new("fixtures");
    for migration in migrations {
        source = source.with(move || migration.clone());
    }
    vec![Box::new(source)]
}

/// How many times any fake migration has executed against `store`.
pub(crate) fn applied_count(store: &dyn DocumentStore) -> u64 {
    store
        .count(APPLIED, &Filter::All)
        .expect("count applied collection")
}

/// How many times the fake migration with `id` has executed.
pub(crate) fn applied_count_of(store: &dyn DocumentStore, id: &str) -> u64 {
    store
        .count(APPLIED, &Filter::eq("migration", id))
        .expect("count applied collection")
}
