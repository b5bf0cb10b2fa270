//! Shared test infrastructure for integration tests.
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

pub const DATABASE: &str = "testdb";

/// A store root plus a migrations directory, both temporary.
pub struct Fixture {
    _dir: TempDir,
    pub store_root: PathBuf,
    pub migrations_dir: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let store_root = dir.path().join("data");
        let migrations_dir = dir.path().join("migrations");
        fs::create_dir_all(&migrations_dir).expect("create migrations dir");
        Self {
            _dir: dir,
            store_root,
            migrations_dir,
        }
    }

    /// Write one migration script into the fixture's migrations directory.
    pub fn write_script(&self, file_name: &str, script: Value) {
        write_script_into(&self.migrations_dir, file_name, script);
    }

    /// Seed the standard three-unit set: plain, always-run, staging-only.
    pub fn seed_example_migrations(&self) {
        self.write_script(
            "create_new_collection.json",
            json!({
                "id": "migration-1",
                "name": "CreateNewCollection",
                "created_at": "2015-01-01T12:12:12Z",
                "steps": [
                    {"insert": {"collection": "test", "document": {"a": true, "b": false}}}
                ]
            }),
        );
        self.write_script(
            "release_counter.json",
            json!({
                "id": "release-counter",
                "name": "ReleaseCounter",
                "created_at": "2016-01-01T00:00:00Z",
                "run_always": true,
                "steps": [
                    {"insert": {"collection": "releases", "document": {"counted": true}}}
                ]
            }),
        );
        self.write_script(
            "obfuscate_email_addresses.json",
            json!({
                "id": "migration-3",
                "name": "ObfuscateEmailAddresses",
                "created_at": "2016-01-01T12:12:16Z",
                "contexts": ["development", "staging"],
                "steps": [
                    {"set": {"collection": "user", "filter": {"exists": "email_address"}, "fields": {"email_address": "deleted"}, "many": true}}
                ]
            }),
        );
    }

    /// Run the binary with `--store` pointed at this fixture.
    pub fn run(&self, args: &[&str]) -> Output {
        let bin = env!("CARGO_BIN_EXE_docmig");
        let store = self.store_root.display().to_string();
        let mut command = Command::new(bin);
        command.arg(args[0]).arg("--store").arg(&store);
        for arg in &args[1..] {
            command.arg(arg);
        }
        command.output().expect("run docmig")
    }

    /// Parse one collection file out of the store, empty when absent.
    pub fn collection(&self, name: &str) -> Vec<Value> {
        let path = self
            .store_root
            .join(DATABASE)
            .join(format!("{name}.json"));
        if !path.exists() {
            return Vec::new();
        }
        let bytes = fs::read(&path).expect("read collection");
        serde_json::from_slice(&bytes).expect("parse collection")
    }

    /// The `locked` field of the lock record, if a record exists.
    pub fn lock_state(&self) -> Option<bool> {
        self.collection("DATABASE_MIGRATIONS_LOCK")
            .first()
            .and_then(|record| record.get("locked"))
            .and_then(Value::as_bool)
    }
}

pub fn write_script_into(dir: &Path, file_name: &str, script: Value) {
    fs::create_dir_all(dir).expect("create script dir");
    fs::write(
        dir.join(file_name),
        serde_json::to_vec_pretty(&script).expect("encode script"),
    )
    .expect("write script");
}

pub fn stdout_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

pub fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}
