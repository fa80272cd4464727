//! Extension points invoked by the verb handlers
//!
//! A specialized controller overrides one of these methods instead of
//! reimplementing a whole handler. Every method defaults to a pass-through.
//!
//! # Example
//!
//! ```rust,ignore
//! use common_route::prelude::*;
//!
//! struct HidePrices;
//!
//! #[async_trait]
//! impl ControllerHooks for HidePrices {
//!     async fn verb_get(&self, mut models: Vec<Document>) -> ControllerResult<Vec<Document>> {
//!         for model in &mut models {
//!             model.remove("price");
//!         }
//!         Ok(models)
//!     }
//! }
//! ```

use crate::core::error::ControllerResult;
use crate::core::store::InsertOutcome;
use async_trait::async_trait;
use mongodb::bson::Document;

/// Hook points of the GET, GET-by-id, PUT and POST pipelines
///
/// Whatever a hook returns becomes the response body (or, for
/// [`pre_update`](ControllerHooks::pre_update), the update payload).
/// Returning an error sends the error response instead.
#[async_trait]
pub trait ControllerHooks: Send + Sync {
    /// Runs after a list read, before serialization
    async fn verb_get(&self, models: Vec<Document>) -> ControllerResult<Vec<Document>> {
        Ok(models)
    }

    /// Runs after a single-document read
    async fn verb_get_by_id(&self, model: Option<Document>) -> ControllerResult<Option<Document>> {
        Ok(model)
    }

    /// Runs before the store call of a PUT; may rewrite the `$set` payload
    async fn pre_update(&self, _id: &str, update: Document) -> ControllerResult<Document> {
        Ok(update)
    }

    /// Runs after the update with the payload actually applied
    async fn post_update(
        &self,
        _update: &Document,
        model: Option<Document>,
    ) -> ControllerResult<Option<Document>> {
        Ok(model)
    }

    /// Runs after an insert with the batch that was sent to the store
    async fn post_insert(
        &self,
        _inserted: &[Document],
        outcome: InsertOutcome,
    ) -> ControllerResult<InsertOutcome> {
        Ok(outcome)
    }
}

/// Hooks that leave every value untouched
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThroughHooks;

impl ControllerHooks for PassThroughHooks {}
