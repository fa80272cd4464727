//! HTTP handlers for the controller verbs
//!
//! Each handler decodes the request parts, calls one [`CommonController`]
//! operation and renders the outcome. Successful results are written as
//! relaxed extended JSON; failures go through the route's [`ErrorMode`].

use crate::core::{CommonController, ControllerError, ControllerResult, ErrorMode, QueryMap};
use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use mongodb::bson::{Bson, Document};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// State shared by the handlers of one mounted collection
#[derive(Clone)]
pub struct RouteState {
    pub controller: CommonController,
    pub error_mode: ErrorMode,
}

impl RouteState {
    pub fn new(controller: CommonController, error_mode: ErrorMode) -> Self {
        Self {
            controller,
            error_mode,
        }
    }

    fn respond<T>(&self, result: ControllerResult<T>, render: impl FnOnce(T) -> Value) -> Response {
        match result {
            Ok(value) => Json(render(value)).into_response(),
            Err(err) => {
                tracing::warn!(
                    collection = self.controller.store().name(),
                    code = err.error_code(),
                    error = %err,
                    "request failed"
                );
                self.error_mode.render(err)
            }
        }
    }
}

type SharedState = State<Arc<RouteState>>;
type RawQuery = Query<Vec<(String, String)>>;

/// GET {path}
pub async fn list(State(state): SharedState, Query(pairs): RawQuery) -> Response {
    let query = QueryMap::from_pairs(pairs);
    let result = state.controller.verb_get(&query).await;
    state.respond(result, documents_to_json)
}

/// GET {path}/{id}
pub async fn get_one(
    State(state): SharedState,
    Path(id): Path<String>,
    Query(pairs): RawQuery,
) -> Response {
    let query = QueryMap::from_pairs(pairs);
    let result = state.controller.verb_get_by_id(&id, &query).await;
    state.respond(result, optional_document_to_json)
}

/// POST {path}
pub async fn create(
    State(state): SharedState,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let result = match body {
        Ok(Json(body)) => state.controller.verb_post(body).await,
        Err(rejection) => Err(body_error(rejection)),
    };
    state.respond(result, serialize)
}

/// PUT {path}/{id}
pub async fn update(
    State(state): SharedState,
    Path(id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let result = match body {
        Ok(Json(body)) => state.controller.verb_put(&id, body).await,
        Err(rejection) => Err(body_error(rejection)),
    };
    state.respond(result, optional_document_to_json)
}

/// DELETE {path}/{id}
pub async fn delete(State(state): SharedState, Path(id): Path<String>) -> Response {
    let result = state.controller.verb_delete(&id).await;
    state.respond(result, serialize)
}

/// PATCH {path}/{id}
pub async fn patch(
    State(state): SharedState,
    Path(id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let body = body.map(|Json(v)| v).unwrap_or(Value::Null);
    let result = state.controller.verb_patch(&id, body).await;
    state.respond(result, |()| Value::Null)
}

/// Any other method on {path}/{id}
///
/// COPY has no `MethodFilter`, so it is dispatched from the method fallback.
pub async fn fallback(State(state): SharedState, method: Method, Path(id): Path<String>) -> Response {
    if method.as_str() != "COPY" {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }
    let result = state.controller.verb_copy(&id).await;
    state.respond(result, |()| Value::Null)
}

fn body_error(rejection: JsonRejection) -> ControllerError {
    ControllerError::InvalidBody {
        message: rejection.body_text(),
    }
}

fn documents_to_json(documents: Vec<Document>) -> Value {
    Bson::Array(documents.into_iter().map(Bson::Document).collect()).into_relaxed_extjson()
}

fn optional_document_to_json(document: Option<Document>) -> Value {
    match document {
        Some(doc) => Bson::Document(doc).into_relaxed_extjson(),
        None => Value::Null,
    }
}

fn serialize<T: Serialize>(value: T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;
    use mongodb::bson::oid::ObjectId;

    #[test]
    fn test_documents_render_as_relaxed_extjson() {
        let id = ObjectId::new();
        let json = documents_to_json(vec![doc! { "_id": id, "price": 12 }]);

        assert_eq!(json[0]["_id"]["$oid"], id.to_hex());
        assert_eq!(json[0]["price"], 12);
    }

    #[test]
    fn test_missing_document_renders_null() {
        assert_eq!(optional_document_to_json(None), Value::Null);
    }
}
