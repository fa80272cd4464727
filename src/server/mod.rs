//! Server module for exposing controllers over HTTP
//!
//! This module provides:
//! - `common_route` / `create` to mount one controller on an axum `Router`
//! - the axum handlers behind each verb
//! - a `ServerBuilder` that mounts many collections plus health routes

pub mod builder;
pub mod handlers;
pub mod router;

pub use builder::ServerBuilder;
pub use handlers::RouteState;
pub use router::{common_route, create};
