//! Declarative migration scripts.
//!
//! A script is one JSON file describing a migration: identity, create date,
//! optional capabilities, and an ordered list of document operations. Scripts
//! are how directories stay loadable at run time without compiling user code
//! into the binary.
use crate::error::MigrateError;
use crate::migration::Migration;
use crate::store::{Document, DocumentStore, Filter};
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// One document operation inside a script.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
enum Step {
    /// Idempotently create a single-field index.
    CreateIndex {
        collection: String,
        field: String,
        #[serde(default)]
        unique: bool,
    },
    /// Append a document.
    Insert {
        collection: String,
        document: Document,
    },
    /// Merge fields into matching documents.
    Set {
        collection: String,
        filter: Filter,
        fields: Document,
        #[serde(default)]
        upsert: bool,
        #[serde(default)]
        many: bool,
    },
    /// Remove matching documents.
    Delete {
        collection: String,
        filter: Filter,
        #[serde(default)]
        many: bool,
    },
}

impl Step {
    fn kind(&self) -> &'static str {
        match self {
            Step::CreateIndex { .. } => "create_index",
            Step::Insert { .. } => "insert",
            Step::Set { .. } => "set",
            Step::Delete { .. } => "delete",
        }
    }

    fn apply(&self, store: &dyn DocumentStore) -> anyhow::Result<()> {
        match self {
            Step::CreateIndex {
                collection,
                field,
                unique,
            } => store.ensure_index(collection, field, *unique)?,
            Step::Insert {
                collection,
                document,
            } => store.insert_one(collection, document.clone())?,
            Step::Set {
                collection,
                filter,
                fields,
                upsert,
                many,
            } => {
                if *many {
                    store.update_many(collection, filter, fields.clone())?;
                } else {
                    store.update_one(collection, filter, fields.clone(), *upsert)?;
                }
            }
            Step::Delete {
                collection,
                filter,
                many,
            } => {
                if *many {
                    store.delete_many(collection, filter)?;
                } else {
                    store.delete_one(collection, filter)?;
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScriptFile {
    id: String,
    #[serde(default)]
    name: Option<String>,
    created_at: DateTime<Utc>,
    #[serde(default)]
    contexts: Option<Vec<String>>,
    #[serde(default)]
    run_always: bool,
    #[serde(default)]
    steps: Vec<Step>,
}

/// A migration loaded from one script file.
#[derive(Debug)]
pub struct ScriptMigration {
    name: String,
    file: ScriptFile,
}

impl ScriptMigration {
    /// Parse a script file. The migration name defaults to the file stem
    /// when the script does not declare one.
    pub fn from_path(path: &Path) -> Result<Self, MigrateError> {
        let invalid = |reason: String| MigrateError::InvalidSource {
            path: path.to_path_buf(),
            reason,
        };
        let bytes = fs::read(path).map_err(|err| invalid(format!("unreadable script: {err}")))?;
        let file: ScriptFile = serde_json::from_slice(&bytes)
            .map_err(|err| invalid(format!("malformed script: {err}")))?;
        if file.id.trim().is_empty() {
            return Err(invalid("empty migration id".to_string()));
        }
        let name = match &file.name {
            Some(name) if !name.trim().is_empty() => name.clone(),
            _ => path
                .file_stem()
                .map(|stem| stem.to_string_lossy().to_string())
                .unwrap_or_else(|| file.id.clone()),
        };
        Ok(Self { name, file })
    }
}

impl Migration for ScriptMigration {
    fn id(&self) -> &str {
        &self.file.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.file.created_at
    }

    fn execute(&self, store: &dyn DocumentStore) -> anyhow::Result<()> {
        for (index, step) in self.file.steps.iter().enumerate() {
            step.apply(store)
                .with_context(|| format!("step {} ({})", index + 1, step.kind()))?;
        }
        Ok(())
    }

    fn contexts(&self) -> Option<&[String]> {
        self.file.contexts.as_deref()
    }

    fn run_always(&self) -> bool {
        self.file.run_always
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn write_script(dir: &Path, name: &str, value: serde_json::Value) -> std::path::PathBuf {
        let path = dir.join(name);
        fs::write(&path, serde_json::to_vec_pretty(&value).expect("encode")).expect("write");
        path
    }

    #[test]
    fn parses_capabilities_and_defaults_name_to_stem() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_script(
            dir.path(),
            "obfuscate_email_addresses.json",
            json!({
                "id": "migration-3",
                "created_at": "2016-01-01T12:12:16Z",
                "contexts": ["development", "staging"],
                "steps": []
            }),
        );
        let script = ScriptMigration::from_path(&path).expect("parse");
        assert_eq!(script.id(), "migration-3");
        assert_eq!(script.name(), "obfuscate_email_addresses");
        assert_eq!(
            script.contexts(),
            Some(&["development".to_string(), "staging".to_string()][..])
        );
        assert!(!script.run_always());
    }

    #[test]
    fn steps_run_in_order_against_the_store() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_script(
            dir.path(),
            "create_user_collection.json",
            json!({
                "id": "create-user-collection-and-its-indexes",
                "name": "CreateUserCollection",
                "created_at": "2016-02-25T16:30:00Z",
                "steps": [
                    {"create_index": {"collection": "user", "field": "email_address", "unique": true}},
                    {"insert": {"collection": "user", "document": {"username": "admin", "email_address": "admin@example.com"}}},
                    {"set": {"collection": "user", "filter": {"eq": {"field": "username", "value": "admin"}}, "fields": {"active": true}}}
                ]
            }),
        );
        let script = ScriptMigration::from_path(&path).expect("parse");
        assert_eq!(script.name(), "CreateUserCollection");

        let store = MemoryStore::new();
        script.execute(&store).expect("execute");
        let admin = store
            .find_one("user", &Filter::eq("username", "admin"))
            .expect("find")
            .expect("admin present");
        assert_eq!(admin.get("active"), Some(&json!(true)));
    }

    #[test]
    fn failing_step_names_its_position() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_script(
            dir.path(),
            "seed_twice.json",
            json!({
                "id": "seed-twice",
                "created_at": "2016-01-01T00:00:00Z",
                "steps": [
                    {"create_index": {"collection": "user", "field": "email_address", "unique": true}},
                    {"insert": {"collection": "user", "document": {"email_address": "a@example.com"}}},
                    {"insert": {"collection": "user", "document": {"email_address": "a@example.com"}}}
                ]
            }),
        );
        let script = ScriptMigration::from_path(&path).expect("parse");
        let store = MemoryStore::new();
        let err = script.execute(&store).expect_err("duplicate insert");
        assert!(err.to_string().contains("step 3 (insert)"));
    }

    #[test]
    fn malformed_script_is_an_invalid_source() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.json");
        fs::write(&path, b"{not json").expect("write");
        let err = ScriptMigration::from_path(&path).expect_err("parse failure");
        assert!(matches!(err, MigrateError::InvalidSource { .. }));
    }

    #[test]
    fn empty_id_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_script(
            dir.path(),
            "anonymous.json",
            json!({"id": "  ", "created_at": "2016-01-01T00:00:00Z", "steps": []}),
        );
        let err = ScriptMigration::from_path(&path).expect_err("empty id");
        assert!(matches!(err, MigrateError::InvalidSource { .. }));
    }
}
