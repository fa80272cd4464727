//! MongoDB storage backend using the official MongoDB async driver.
//!
//! Provides `MongoStore`, a [`DocumentStore`] over one
//! `mongodb::Collection<Document>`. Every trait call maps onto exactly one
//! driver call; results and errors are passed through unchanged apart from
//! being wrapped in the store's own types.
//!
//! # Example
//!
//! ```rust,ignore
//! use mongodb::Client;
//! use common_route::storage::MongoStore;
//!
//! let client = Client::with_uri_str("mongodb://localhost:27017").await?;
//! let store = MongoStore::from_database(&client.database("shop"), "items");
//! let controller = CommonController::new(Arc::new(store));
//! ```

use crate::core::store::{
    DeleteOutcome, DocumentStore, FindOneOptions, FindOptions, InsertOutcome, StoreError,
    StoreResult, UpdateOptions,
};
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::Document;
use mongodb::options::{self, ReturnDocument};
use mongodb::{Collection, Database};

/// Document store backed by a MongoDB collection
#[derive(Clone, Debug)]
pub struct MongoStore {
    collection: Collection<Document>,
}

impl MongoStore {
    /// Wrap an existing collection handle
    pub fn new(collection: Collection<Document>) -> Self {
        Self { collection }
    }

    /// Open `name` in `database`
    pub fn from_database(database: &Database, name: &str) -> Self {
        Self::new(database.collection(name))
    }

    /// Get a reference to the underlying collection.
    pub fn collection(&self) -> &Collection<Document> {
        &self.collection
    }
}

// ---------------------------------------------------------------------------
// Option conversion
// ---------------------------------------------------------------------------

fn driver_find_options(options: FindOptions) -> options::FindOptions {
    options::FindOptions::builder()
        .projection(options.projection)
        .sort(options.sort)
        .limit(options.limit)
        .skip(options.skip)
        .build()
}

fn driver_find_one_options(options: FindOneOptions) -> options::FindOneOptions {
    options::FindOneOptions::builder()
        .projection(options.projection)
        .sort(options.sort)
        .skip(options.skip)
        .build()
}

fn driver_update_options(options: UpdateOptions) -> options::FindOneAndUpdateOptions {
    let return_document = if options.return_after {
        ReturnDocument::After
    } else {
        ReturnDocument::Before
    };
    options::FindOneAndUpdateOptions::builder()
        .projection(options.projection)
        .upsert(Some(options.upsert))
        .return_document(Some(return_document))
        .build()
}

#[async_trait]
impl DocumentStore for MongoStore {
    fn name(&self) -> &str {
        self.collection.name()
    }

    async fn find(&self, filter: Document, options: FindOptions) -> StoreResult<Vec<Document>> {
        let cursor = self
            .collection
            .find(filter)
            .with_options(driver_find_options(options))
            .await?;

        Ok(cursor.try_collect().await?)
    }

    async fn find_one(
        &self,
        filter: Document,
        options: FindOneOptions,
    ) -> StoreResult<Option<Document>> {
        Ok(self
            .collection
            .find_one(filter)
            .with_options(driver_find_one_options(options))
            .await?)
    }

    async fn insert_many(&self, documents: Vec<Document>) -> StoreResult<InsertOutcome> {
        if documents.is_empty() {
            return Err(StoreError::InvalidDocument {
                message: "insert_many requires at least one document".to_string(),
            });
        }
        let inserted_count = documents.len();
        let result = self.collection.insert_many(documents).await?;

        Ok(InsertOutcome {
            acknowledged: true,
            inserted_count,
            inserted_ids: result.inserted_ids.into_iter().collect(),
        })
    }

    async fn find_one_and_update(
        &self,
        filter: Document,
        update: Document,
        options: UpdateOptions,
    ) -> StoreResult<Option<Document>> {
        Ok(self
            .collection
            .find_one_and_update(filter, update)
            .with_options(driver_update_options(options))
            .await?)
    }

    async fn delete_one(&self, filter: Document) -> StoreResult<DeleteOutcome> {
        let result = self.collection.delete_one(filter).await?;

        Ok(DeleteOutcome {
            acknowledged: true,
            deleted_count: result.deleted_count,
        })
    }
}
