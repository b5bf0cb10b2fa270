//! In-process store backend.
//!
//! One mutex guards all collections, so every trait method is a single
//! critical section and the find-and-replace primitive cannot interleave
//! with another caller.
use crate::error::StoreError;
use crate::store::{merge_fields, unique_conflict, Document, DocumentStore, Filter};
use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;

#[derive(Default)]
struct CollectionData {
    documents: Vec<Document>,
    unique_fields: BTreeSet<String>,
}

/// Store backend holding everything in memory. Primarily for tests and
/// embedded use; state dies with the process.
#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<String, CollectionData>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CollectionData {
    fn unique_fields_vec(&self) -> Vec<String> {
        self.unique_fields.iter().cloned().collect()
    }

    fn position(&self, filter: &Filter) -> Option<usize> {
        self.documents.iter().position(|doc| filter.matches(doc))
    }
}

impl DocumentStore for MemoryStore {
    fn ensure_index(&self, collection: &str, field: &str, unique: bool) -> Result<(), StoreError> {
        let mut collections = self.collections.lock().expect("store mutex poisoned");
        let data = collections.entry(collection.to_string()).or_default();
        if unique {
            data.unique_fields.insert(field.to_string());
        }
        Ok(())
    }

    fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Option<Document>, StoreError> {
        let collections = self.collections.lock().expect("store mutex poisoned");
        let Some(data) = collections.get(collection) else {
            return Ok(None);
        };
        Ok(data.documents.iter().find(|doc| filter.matches(doc)).cloned())
    }

    fn count(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        let collections = self.collections.lock().expect("store mutex poisoned");
        let Some(data) = collections.get(collection) else {
            return Ok(0);
        };
        Ok(data.documents.iter().filter(|doc| filter.matches(doc)).count() as u64)
    }

    fn insert_one(&self, collection: &str, document: Document) -> Result<(), StoreError> {
        let mut collections = self.collections.lock().expect("store mutex poisoned");
        let data = collections.entry(collection.to_string()).or_default();
        let unique = data.unique_fields_vec();
        if let Some(field) = unique_conflict(&data.documents, &document, None, &unique) {
            return Err(StoreError::UniqueViolation {
                collection: collection.to_string(),
                field,
            });
        }
        data.documents.push(document);
        Ok(())
    }

    fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        fields: Document,
        upsert: bool,
    ) -> Result<u64, StoreError> {
        let mut collections = self.collections.lock().expect("store mutex poisoned");
        let data = collections.entry(collection.to_string()).or_default();
        let unique = data.unique_fields_vec();
        match data.position(filter) {
            Some(index) => {
                let mut updated = data.documents[index].clone();
                merge_fields(&mut updated, &fields);
                if let Some(field) = unique_conflict(&data.documents, &updated, Some(index), &unique)
                {
                    return Err(StoreError::UniqueViolation {
                        collection: collection.to_string(),
                        field,
                    });
                }
                data.documents[index] = updated;
                Ok(1)
            }
            None if upsert => {
                if let Some(field) = unique_conflict(&data.documents, &fields, None, &unique) {
                    return Err(StoreError::UniqueViolation {
                        collection: collection.to_string(),
                        field,
                    });
                }
                data.documents.push(fields);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    fn update_many(
        &self,
        collection: &str,
        filter: &Filter,
        fields: Document,
    ) -> Result<u64, StoreError> {
        let mut collections = self.collections.lock().expect("store mutex poisoned");
        let Some(data) = collections.get_mut(collection) else {
            return Ok(0);
        };
        let mut affected = 0;
        for document in data.documents.iter_mut().filter(|doc| filter.matches(doc)) {
            merge_fields(document, &fields);
            affected += 1;
        }
        Ok(affected)
    }

    fn delete_one(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        let mut collections = self.collections.lock().expect("store mutex poisoned");
        let Some(data) = collections.get_mut(collection) else {
            return Ok(0);
        };
        match data.position(filter) {
            Some(index) => {
                data.documents.remove(index);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    fn delete_many(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        let mut collections = self.collections.lock().expect("store mutex poisoned");
        let Some(data) = collections.get_mut(collection) else {
            return Ok(0);
        };
        let before = data.documents.len();
        data.documents.retain(|doc| !filter.matches(doc));
        Ok((before - data.documents.len()) as u64)
    }

    fn find_one_and_replace(
        &self,
        collection: &str,
        filter: &Filter,
        replacement: Document,
        upsert: bool,
    ) -> Result<Option<Document>, StoreError> {
        let mut collections = self.collections.lock().expect("store mutex poisoned");
        let data = collections.entry(collection.to_string()).or_default();
        let unique = data.unique_fields_vec();
        match data.position(filter) {
            Some(index) => {
                if let Some(field) =
                    unique_conflict(&data.documents, &replacement, Some(index), &unique)
                {
                    return Err(StoreError::UniqueViolation {
                        collection: collection.to_string(),
                        field,
                    });
                }
                let previous = std::mem::replace(&mut data.documents[index], replacement);
                Ok(Some(previous))
            }
            None if upsert => {
                if let Some(field) = unique_conflict(&data.documents, &replacement, None, &unique) {
                    return Err(StoreError::UniqueViolation {
                        collection: collection.to_string(),
                        field,
                    });
                }
                data.documents.push(replacement);
                Ok(None)
            }
            None => Ok(None),
        }
    }
}
