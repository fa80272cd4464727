//! Route registration for a controller
//!
//! One controller is mounted as two routes:
//! - `GET /{path}` list, `POST /{path}` insert
//! - `GET | PUT | DELETE | PATCH | COPY /{path}/{id}`

use super::handlers::{self, RouteState};
use crate::config::normalize_route_path;
use crate::core::{CommonController, DocumentStore, ErrorMode};
use axum::Router;
use axum::routing::get;
use std::sync::Arc;

/// Register the verb handlers of `controller` under `path`
///
/// # Panics
///
/// Like [`Router::route`], panics if `path` overlaps a route already on
/// `router`. [`ServerBuilder::build`](super::ServerBuilder::build) checks
/// mount paths up front and returns an error instead.
pub fn common_route(
    router: Router,
    path: &str,
    controller: CommonController,
    error_mode: ErrorMode,
) -> Router {
    let path = normalize_route_path(path);
    let state = Arc::new(RouteState::new(controller, error_mode));

    tracing::debug!(path, collection = state.controller.store().name(), "mounting controller");

    let routes = Router::new()
        .route(path, get(handlers::list).post(handlers::create))
        .route(
            &format!("{}/{{id}}", path.trim_end_matches('/')),
            get(handlers::get_one)
                .put(handlers::update)
                .delete(handlers::delete)
                .patch(handlers::patch)
                .fallback(handlers::fallback),
        )
        .with_state(state);

    router.merge(routes)
}

/// Build a controller over `store` with pass-through hooks and mount it
///
/// # Example
///
/// ```rust,ignore
/// let app = create(Router::new(), "/items", Arc::new(MongoStore::from_database(&db, "items")));
/// ```
pub fn create(router: Router, path: &str, store: Arc<dyn DocumentStore>) -> Router {
    common_route(router, path, CommonController::new(store), ErrorMode::default())
}
