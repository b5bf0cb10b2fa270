//! File-backed store backend.
//!
//! One JSON file per collection plus an `indexes.json` sidecar, all under a
//! single root directory. Every trait method runs under an exclusive flock
//! on `.store.lock`, so each call is atomic across processes; writes go
//! through a temp file and rename.
use crate::error::StoreError;
use crate::store::{merge_fields, unique_conflict, Document, DocumentStore, Filter};
use fs2::FileExt;
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

const GUARD_FILE: &str = ".store.lock";
const INDEXES_FILE: &str = "indexes.json";

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
struct IndexSpec {
    field: String,
    unique: bool,
}

/// Store backend persisting collections as JSON files under one directory.
pub struct FileStore {
    root: PathBuf,
}

/// Exclusive hold on the store guard file for the duration of one call.
struct Guard {
    file: File,
}

impl Drop for Guard {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

impl FileStore {
    /// Open (creating if needed) the store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| StoreError::Io {
            path: root.clone(),
            source,
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn exclusive(&self) -> Result<Guard, StoreError> {
        let path = self.root.join(GUARD_FILE);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|source| StoreError::Io {
                path: path.clone(),
                source,
            })?;
        file.lock_exclusive()
            .map_err(|source| StoreError::Io { path, source })?;
        Ok(Guard { file })
    }

    fn collection_path(&self, collection: &str) -> PathBuf {
        self.root.join(format!("{collection}.json"))
    }

    fn load_collection(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        let path = self.collection_path(collection);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let bytes = fs::read(&path).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;
        serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt { path, source })
    }

    fn save_collection(
        &self,
        collection: &str,
        documents: &[Document],
    ) -> Result<(), StoreError> {
        write_json(&self.collection_path(collection), documents)
    }

    fn load_indexes(&self) -> Result<BTreeMap<String, Vec<IndexSpec>>, StoreError> {
        let path = self.root.join(INDEXES_FILE);
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let bytes = fs::read(&path).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;
        serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt { path, source })
    }

    fn unique_fields(&self, collection: &str) -> Result<Vec<String>, StoreError> {
        let indexes = self.load_indexes()?;
        Ok(indexes
            .get(collection)
            .map(|specs| {
                specs
                    .iter()
                    .filter(|spec| spec.unique)
                    .map(|spec| spec.field.clone())
                    .collect()
            })
            .unwrap_or_default())
    }
}

fn write_json<T: serde::Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec_pretty(value).map_err(StoreError::Encode)?;
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("collection");
    let tmp_path = path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(format!(".{file_name}.tmp"));
    fs::write(&tmp_path, &bytes).map_err(|source| StoreError::Io {
        path: tmp_path.clone(),
        source,
    })?;
    fs::rename(&tmp_path, path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

impl DocumentStore for FileStore {
    fn ensure_index(&self, collection: &str, field: &str, unique: bool) -> Result<(), StoreError> {
        let _guard = self.exclusive()?;
        let mut indexes = self.load_indexes()?;
        let specs = indexes.entry(collection.to_string()).or_default();
        let spec = IndexSpec {
            field: field.to_string(),
            unique,
        };
        if !specs.contains(&spec) {
            specs.retain(|existing| existing.field != spec.field);
            specs.push(spec);
            write_json(&self.root.join(INDEXES_FILE), &indexes)?;
        }
        Ok(())
    }

    fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Option<Document>, StoreError> {
        let _guard = self.exclusive()?;
        let documents = self.load_collection(collection)?;
        Ok(documents.into_iter().find(|doc| filter.matches(doc)))
    }

    fn count(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        let _guard = self.exclusive()?;
        let documents = self.load_collection(collection)?;
        Ok(documents.iter().filter(|doc| filter.matches(doc)).count() as u64)
    }

    fn insert_one(&self, collection: &str, document: Document) -> Result<(), StoreError> {
        let _guard = self.exclusive()?;
        let mut documents = self.load_collection(collection)?;
        let unique = self.unique_fields(collection)?;
        if let Some(field) = unique_conflict(&documents, &document, None, &unique) {
            return Err(StoreError::UniqueViolation {
                collection: collection.to_string(),
                field,
            });
        }
        documents.push(document);
        self.save_collection(collection, &documents)
    }

    fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        fields: Document,
        upsert: bool,
    ) -> Result<u64, StoreError> {
        let _guard = self.exclusive()?;
        let mut documents = self.load_collection(collection)?;
        let unique = self.unique_fields(collection)?;
        match documents.iter().position(|doc| filter.matches(doc)) {
            Some(index) => {
                let mut updated = documents[index].clone();
                merge_fields(&mut updated, &fields);
                if let Some(field) = unique_conflict(&documents, &updated, Some(index), &unique) {
                    return Err(StoreError::UniqueViolation {
                        collection: collection.to_string(),
                        field,
                    });
                }
                documents[index] = updated;
                self.save_collection(collection, &documents)?;
                Ok(1)
            }
            None if upsert => {
                if let Some(field) = unique_conflict(&documents, &fields, None, &unique) {
                    return Err(StoreError::UniqueViolation {
                        collection: collection.to_string(),
                        field,
                    });
                }
                documents.push(fields);
                self.save_collection(collection, &documents)?;
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
        let _guard = self.exclusive()?;
        let mut documents = self.load_collection(collection)?;
        let mut affected = 0;
        for document in documents.iter_mut().filter(|doc| filter.matches(doc)) {
            merge_fields(document, &fields);
            affected += 1;
        }
        if affected > 0 {
            self.save_collection(collection, &documents)?;
        }
        Ok(affected)
    }

    fn delete_one(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        let _guard = self.exclusive()?;
        let mut documents = self.load_collection(collection)?;
        match documents.iter().position(|doc| filter.matches(doc)) {
            Some(index) => {
                documents.remove(index);
                self.save_collection(collection, &documents)?;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    fn delete_many(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        let _guard = self.exclusive()?;
        let mut documents = self.load_collection(collection)?;
        let before = documents.len();
        documents.retain(|doc| !filter.matches(doc));
        let removed = before - documents.len();
        if removed > 0 {
            self.save_collection(collection, &documents)?;
        }
        Ok(removed as u64)
    }

    fn find_one_and_replace(
        &self,
        collection: &str,
        filter: &Filter,
        replacement: Document,
        upsert: bool,
    ) -> Result<Option<Document>, StoreError> {
        let _guard = self.exclusive()?;
        let mut documents = self.load_collection(collection)?;
        let unique = self.unique_fields(collection)?;
        match documents.iter().position(|doc| filter.matches(doc)) {
            Some(index) => {
                if let Some(field) = unique_conflict(&documents, &replacement, Some(index), &unique)
                {
                    return Err(StoreError::UniqueViolation {
                        collection: collection.to_string(),
                        field,
                    });
                }
                let previous = std::mem::replace(&mut documents[index], replacement);
                self.save_collection(collection, &documents)?;
                Ok(Some(previous))
            }
            None if upsert => {
                if let Some(field) = unique_conflict(&documents, &replacement, None, &unique) {
                    return Err(StoreError::UniqueViolation {
                        collection: collection.to_string(),
                        field,
                    });
                }
                documents.push(replacement);
                self.save_collection(collection, &documents)?;
                Ok(None)
            }
            None => Ok(None),
        }
    }
}
