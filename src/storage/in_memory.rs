//! In-memory implementation of DocumentStore for testing and development

use super::matcher::{apply_update, compare_docs, matches, project, upsert_seed};
use crate::core::store::{
    DeleteOutcome, DocumentStore, FindOneOptions, FindOptions, InsertOutcome, StoreError,
    StoreResult, UpdateOptions,
};
use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;
use mongodb::bson::{Bson, Document};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// In-memory collection
///
/// Documents are kept in insertion order. Uses RwLock for thread-safe access;
/// clones share the same underlying collection.
#[derive(Clone)]
pub struct InMemoryStore {
    name: String,
    documents: Arc<RwLock<Vec<Document>>>,
}

impl InMemoryStore {
    /// Create an empty collection
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            documents: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Number of stored documents
    pub fn len(&self) -> StoreResult<usize> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.read()?.is_empty())
    }

    /// Copy of every stored document
    pub fn snapshot(&self) -> StoreResult<Vec<Document>> {
        Ok(self.read()?.clone())
    }

    pub fn clear(&self) -> StoreResult<()> {
        self.write()?.clear();
        Ok(())
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Vec<Document>>> {
        self.documents
            .read()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Vec<Document>>> {
        self.documents
            .write()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }

    /// Matching documents, sorted, with `skip` applied
    fn select(
        documents: &[Document],
        filter: &Document,
        sort: Option<&Document>,
        skip: Option<u64>,
    ) -> StoreResult<Vec<Document>> {
        let mut selected = Vec::new();
        for doc in documents {
            if matches(doc, filter)? {
                selected.push(doc.clone());
            }
        }
        if let Some(sort) = sort {
            selected.sort_by(|a, b| compare_docs(a, b, sort));
        }
        let skip = usize::try_from(skip.unwrap_or(0)).unwrap_or(usize::MAX);
        Ok(selected.into_iter().skip(skip).collect())
    }
}

fn project_all(documents: Vec<Document>, projection: Option<&Document>) -> Vec<Document> {
    match projection {
        Some(p) => documents.iter().map(|d| project(d, p)).collect(),
        None => documents,
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn find(&self, filter: Document, options: FindOptions) -> StoreResult<Vec<Document>> {
        let documents = self.read()?;
        let mut selected =
            Self::select(&documents, &filter, options.sort.as_ref(), options.skip)?;

        // negative limits behave like their absolute value, as with the driver
        if let Some(limit) = options.limit.filter(|l| *l != 0) {
            let limit = usize::try_from(limit.unsigned_abs()).unwrap_or(usize::MAX);
            selected.truncate(limit);
        }

        Ok(project_all(selected, options.projection.as_ref()))
    }

    async fn find_one(
        &self,
        filter: Document,
        options: FindOneOptions,
    ) -> StoreResult<Option<Document>> {
        let documents = self.read()?;
        let selected = Self::select(&documents, &filter, options.sort.as_ref(), options.skip)?;

        Ok(project_all(selected, options.projection.as_ref())
            .into_iter()
            .next())
    }

    async fn insert_many(&self, documents: Vec<Document>) -> StoreResult<InsertOutcome> {
        if documents.is_empty() {
            return Err(StoreError::InvalidDocument {
                message: "insert_many requires at least one document".to_string(),
            });
        }
        let mut stored = self.write()?;

        let mut batch = Vec::with_capacity(documents.len());
        let mut inserted_ids = BTreeMap::new();
        for (index, mut doc) in documents.into_iter().enumerate() {
            let id = match doc.get("_id") {
                Some(id) => id.clone(),
                None => {
                    let id = Bson::ObjectId(ObjectId::new());
                    doc.insert("_id", id.clone());
                    id
                }
            };

            let taken = stored
                .iter()
                .chain(batch.iter())
                .any(|existing: &Document| existing.get("_id") == Some(&id));
            if taken {
                return Err(StoreError::DuplicateKey { id: id.to_string() });
            }

            inserted_ids.insert(index, id);
            batch.push(doc);
        }

        let inserted_count = batch.len();
        stored.extend(batch);

        Ok(InsertOutcome {
            acknowledged: true,
            inserted_count,
            inserted_ids,
        })
    }

    async fn find_one_and_update(
        &self,
        filter: Document,
        update: Document,
        options: UpdateOptions,
    ) -> StoreResult<Option<Document>> {
        let mut stored = self.write()?;

        let mut position = None;
        for (index, doc) in stored.iter().enumerate() {
            if matches(doc, &filter)? {
                position = Some(index);
                break;
            }
        }

        let (before, after) = match position {
            Some(index) => {
                let before = stored[index].clone();
                let mut after = before.clone();
                apply_update(&mut after, &update)?;
                if after.get("_id") != before.get("_id") {
                    return Err(StoreError::InvalidDocument {
                        message: "the _id field is immutable".to_string(),
                    });
                }
                stored[index] = after.clone();
                (Some(before), after)
            }
            None if options.upsert => {
                let mut created = upsert_seed(&filter)?;
                apply_update(&mut created, &update)?;
                if !created.contains_key("_id") {
                    created.insert("_id", ObjectId::new());
                }
                stored.push(created.clone());
                (None, created)
            }
            None => return Ok(None),
        };

        let returned = if options.return_after {
            Some(after)
        } else {
            before
        };
        Ok(returned.map(|doc| match &options.projection {
            Some(p) => project(&doc, p),
            None => doc,
        }))
    }

    async fn delete_one(&self, filter: Document) -> StoreResult<DeleteOutcome> {
        let mut stored = self.write()?;

        let mut position = None;
        for (index, doc) in stored.iter().enumerate() {
            if matches(doc, &filter)? {
                position = Some(index);
                break;
            }
        }

        let deleted_count = match position {
            Some(index) => {
                stored.remove(index);
                1
            }
            None => 0,
        };

        Ok(DeleteOutcome {
            acknowledged: true,
            deleted_count,
        })
    }
}
