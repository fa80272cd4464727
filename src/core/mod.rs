//! Core module containing the controller, its request model and its seams

pub mod controller;
pub mod error;
pub mod filter;
pub mod hooks;
pub mod query;
pub mod store;

pub use controller::CommonController;
pub use error::{ControllerError, ControllerResult, ErrorMode};
pub use filter::FilterBuilder;
pub use hooks::{ControllerHooks, PassThroughHooks};
pub use query::{Modifiers, QueryMap, QueryValue, SortDirection};
pub use store::{DocumentStore, StoreError};
