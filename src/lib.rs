//! # common-route
//!
//! A generic REST controller that maps HTTP verbs onto CRUD operations
//! against a single document-store collection.
//!
//! ## Features
//!
//! - **Query-String Filters**: plain keys become equality matches, `key__regex`
//!   a regular expression, `key__json` an arbitrary query operator
//! - **Modifiers**: `__fields`, `__sort`, `__limit`, `__skip` (and `__populate`)
//! - **Hook Points**: override `verb_get`, `verb_get_by_id`, `pre_update`,
//!   `post_update` or `post_insert` without rewriting a handler
//! - **Pluggable Stores**: MongoDB through the official driver, or an in-memory
//!   collection for tests and development
//! - **Configuration-Based**: declare routes and the error mode in YAML
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use common_route::prelude::*;
//!
//! let client = mongodb::Client::with_uri_str("mongodb://localhost:27017").await?;
//! let items = MongoStore::from_database(&client.database("shop"), "items");
//!
//! // GET/POST /items, GET/PUT/DELETE /items/{id}
//! let app = create(Router::new(), "/items", Arc::new(items));
//! ```

pub mod config;
pub mod core;
pub mod server;
pub mod storage;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Core ===
    pub use crate::core::{
        CommonController, ControllerError, ControllerHooks, ControllerResult, DocumentStore,
        ErrorMode, FilterBuilder, Modifiers, PassThroughHooks, QueryMap, QueryValue,
        SortDirection, StoreError,
        store::{DeleteOutcome, FindOneOptions, FindOptions, InsertOutcome, UpdateOptions},
    };

    // === Storage ===
    pub use crate::storage::{InMemoryStore, MongoStore};

    // === Config ===
    pub use crate::config::{MongoConfig, RouteConfig, ServiceConfig};

    // === Server ===
    pub use crate::server::{RouteState, ServerBuilder, common_route, create};

    // === External dependencies ===
    pub use anyhow::Result;
    pub use async_trait::async_trait;
    pub use mongodb::bson::{Bson, Document, doc};
    pub use serde::{Deserialize, Serialize};
    pub use std::sync::Arc;

    // === Axum ===
    pub use axum::Router;
}
