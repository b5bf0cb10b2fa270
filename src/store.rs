//! Document store seam consumed by the migration engine.
//!
//! The engine never talks to a concrete database; it sees this trait and the
//! small document/filter model below. Backends supply the atomicity
//! guarantees documented on each method, in particular the single-call
//! find-and-replace used for lock arbitration.
mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A schemaless record: one JSON object.
pub type Document = Map<String, Value>;

/// The query subset the engine and migration scripts need.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Filter {
    /// Matches every document.
    All,
    /// Matches documents whose `field` equals `value`.
    Eq { field: String, value: Value },
    /// Matches documents that carry `field` at all.
    Exists(String),
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn exists(field: impl Into<String>) -> Self {
        Filter::Exists(field.into())
    }

    pub fn matches(&self, document: &Document) -> bool {
        match self {
            Filter::All => true,
            Filter::Eq { field, value } => document.get(field) == Some(value),
            Filter::Exists(field) => document.contains_key(field),
        }
    }
}

/// Operations the engine requires from any backing document database.
///
/// Every method is a single round-trip the backend performs atomically with
/// respect to other callers of the same store.
pub trait DocumentStore: Send + Sync {
    /// Idempotently create a single-field index.
    fn ensure_index(&self, collection: &str, field: &str, unique: bool) -> Result<(), StoreError>;

    /// First matching document in insertion order, if any.
    fn find_one(&self, collection: &str, filter: &Filter)
        -> Result<Option<Document>, StoreError>;

    fn count(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError>;

    /// Append a document; fails on unique index violations.
    fn insert_one(&self, collection: &str, document: Document) -> Result<(), StoreError>;

    /// Merge `fields` into the first match. With `upsert`, a miss inserts
    /// `fields` as a fresh document. Returns the number of affected documents.
    fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        fields: Document,
        upsert: bool,
    ) -> Result<u64, StoreError>;

    /// Merge `fields` into every match. Unique indexes are not re-checked
    /// here; a multi-document merge that collides is the caller's problem.
    fn update_many(
        &self,
        collection: &str,
        filter: &Filter,
        fields: Document,
    ) -> Result<u64, StoreError>;

    fn delete_one(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError>;

    fn delete_many(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError>;

    /// Atomically replace the first match wholesale and return the document
    /// it displaced. With `upsert`, a miss inserts `replacement` and returns
    /// `None`. No other caller can observe the store between the read and
    /// the write.
    fn find_one_and_replace(
        &self,
        collection: &str,
        filter: &Filter,
        replacement: Document,
        upsert: bool,
    ) -> Result<Option<Document>, StoreError>;
}

/// Serialize any value into a [`Document`].
pub fn to_document<T: Serialize>(value: &T) -> Result<Document, StoreError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(StoreError::Encode(serde::ser::Error::custom(
            "value is not a JSON object",
        ))),
        Err(source) => Err(StoreError::Encode(source)),
    }
}

/// Overlay `fields` onto `target`, replacing colliding keys.
pub(crate) fn merge_fields(target: &mut Document, fields: &Document) {
    for (key, value) in fields {
        target.insert(key.clone(), value.clone());
    }
}

/// Check `candidate` against every other document for unique-field clashes.
///
/// `skip` names the slot `candidate` will occupy, so a document never
/// conflicts with itself.
pub(crate) fn unique_conflict(
    documents: &[Document],
    candidate: &Document,
    skip: Option<usize>,
    unique_fields: &[String],
) -> Option<String> {
    for field in unique_fields {
        let Some(value) = candidate.get(field) else {
            continue;
        };
        let clash = documents
            .iter()
            .enumerate()
            .filter(|(index, _)| Some(*index) != skip)
            .any(|(_, existing)| existing.get(field) == Some(value));
        if clash {
            return Some(field.clone());
        }
    }
    None
}
