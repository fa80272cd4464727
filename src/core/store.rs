//! Document store seam used by the verb handlers
//!
//! The controller never talks to a driver directly. It issues exactly one
//! call per request through [`DocumentStore`], whose surface mirrors the
//! conventional document-database collection API (filter + options in,
//! future of a result out).

use async_trait::async_trait;
use axum::http::StatusCode;
use mongodb::bson::{Bson, Document};
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

/// Options for a multi-document read
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    /// Inclusion/exclusion projection (`{field: 1}`)
    pub projection: Option<Document>,
    /// Sort specification (`{field: 1 | -1}`)
    pub sort: Option<Document>,
    /// Maximum number of documents, `None` for unbounded
    pub limit: Option<i64>,
    /// Number of matching documents to skip
    pub skip: Option<u64>,
}

/// Options for a single-document read
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOneOptions {
    pub projection: Option<Document>,
    pub sort: Option<Document>,
    pub skip: Option<u64>,
}

/// Options for `find_one_and_update`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateOptions {
    pub projection: Option<Document>,
    /// Insert a new document when nothing matches
    pub upsert: bool,
    /// Return the document as it is after the update instead of before
    pub return_after: bool,
}

/// Result of an `insert_many` call
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertOutcome {
    pub acknowledged: bool,
    pub inserted_count: usize,
    /// Batch index → assigned `_id`
    pub inserted_ids: BTreeMap<usize, Bson>,
}

/// Result of a `delete_one` call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOutcome {
    pub acknowledged: bool,
    pub deleted_count: u64,
}

/// Errors raised by store backends
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("MongoDB error: {0}")]
    Driver(#[from] mongodb::error::Error),

    #[error("Duplicate key: document with _id '{id}' already exists")]
    DuplicateKey { id: String },

    #[error("Unsupported query operator '{operator}'")]
    UnsupportedOperator { operator: String },

    #[error("Invalid document: {message}")]
    InvalidDocument { message: String },

    #[error("Invalid query: {message}")]
    InvalidQuery { message: String },

    #[error("Store lock poisoned: {0}")]
    LockPoisoned(String),
}

impl StoreError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            StoreError::Driver(_) => StatusCode::INTERNAL_SERVER_ERROR,
            StoreError::DuplicateKey { .. } => StatusCode::CONFLICT,
            StoreError::UnsupportedOperator { .. } => StatusCode::BAD_REQUEST,
            StoreError::InvalidDocument { .. } => StatusCode::BAD_REQUEST,
            StoreError::InvalidQuery { .. } => StatusCode::BAD_REQUEST,
            StoreError::LockPoisoned(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            StoreError::Driver(_) => "STORE_ERROR",
            StoreError::DuplicateKey { .. } => "DUPLICATE_KEY",
            StoreError::UnsupportedOperator { .. } => "UNSUPPORTED_OPERATOR",
            StoreError::InvalidDocument { .. } => "INVALID_DOCUMENT",
            StoreError::InvalidQuery { .. } => "INVALID_QUERY",
            StoreError::LockPoisoned(_) => "STORE_ERROR",
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A single document collection
///
/// Implementations must be safe to share across concurrent requests; the
/// controller holds one long-lived handle and imposes no locking of its own.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Collection name, used for logging
    fn name(&self) -> &str;

    /// All documents matching `filter`
    async fn find(&self, filter: Document, options: FindOptions) -> StoreResult<Vec<Document>>;

    /// First document matching `filter`
    async fn find_one(
        &self,
        filter: Document,
        options: FindOneOptions,
    ) -> StoreResult<Option<Document>>;

    /// Insert a batch of documents, assigning `_id` where missing
    async fn insert_many(&self, documents: Vec<Document>) -> StoreResult<InsertOutcome>;

    /// Apply `update` to the first match of `filter`
    async fn find_one_and_update(
        &self,
        filter: Document,
        update: Document,
        options: UpdateOptions,
    ) -> StoreResult<Option<Document>>;

    /// Delete the first match of `filter`; no match is not an error
    async fn delete_one(&self, filter: Document) -> StoreResult<DeleteOutcome>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::oid::ObjectId;

    #[test]
    fn test_insert_outcome_serializes_camel_case() {
        let id = ObjectId::new();
        let mut inserted_ids = BTreeMap::new();
        inserted_ids.insert(0, Bson::ObjectId(id));
        let outcome = InsertOutcome {
            acknowledged: true,
            inserted_count: 1,
            inserted_ids,
        };

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["insertedCount"], 1);
        assert_eq!(json["acknowledged"], true);
        assert_eq!(json["insertedIds"]["0"]["$oid"], id.to_hex());
    }

    #[test]
    fn test_delete_outcome_serializes_camel_case() {
        let json = serde_json::to_value(DeleteOutcome {
            acknowledged: true,
            deleted_count: 0,
        })
        .unwrap();
        assert_eq!(json["deletedCount"], 0);
    }

    #[test]
    fn test_store_error_codes() {
        let err = StoreError::UnsupportedOperator {
            operator: "$where".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(err.to_string().contains("$where"));

        let err = StoreError::LockPoisoned("boom".to_string());
        assert_eq!(err.error_code(), "STORE_ERROR");
    }
}
