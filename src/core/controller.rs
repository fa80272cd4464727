//! The generic CRUD controller
//!
//! [`CommonController`] sequences filter building, modifier parsing, one
//! store call and the hook points for each HTTP verb. It knows nothing
//! about HTTP itself: handlers in [`crate::server::handlers`] feed it the
//! decoded request parts and render whatever it returns.

use crate::core::error::{ControllerError, ControllerResult};
use crate::core::filter::FilterBuilder;
use crate::core::hooks::{ControllerHooks, PassThroughHooks};
use crate::core::query::{MODIFIER_KEYS, Modifiers, QueryMap};
use crate::core::store::{DeleteOutcome, DocumentStore, InsertOutcome, UpdateOptions};
use mongodb::bson::oid::ObjectId;
use mongodb::bson::{Bson, Document, doc};
use serde_json::Value;
use std::sync::Arc;

/// CRUD controller bound to one collection
#[derive(Clone)]
pub struct CommonController {
    store: Arc<dyn DocumentStore>,
    hooks: Arc<dyn ControllerHooks>,
    filter_builder: FilterBuilder,
}

impl CommonController {
    /// Controller with pass-through hooks and the default reserved keys
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            hooks: Arc::new(PassThroughHooks),
            filter_builder: FilterBuilder::new(),
        }
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn ControllerHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_filter_builder(mut self, filter_builder: FilterBuilder) -> Self {
        self.filter_builder = filter_builder;
        self
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn modifiers(&self, query: &QueryMap) -> ControllerResult<Modifiers> {
        Modifiers::from_query(query)
    }

    pub fn build_filter(&self, query: &QueryMap) -> ControllerResult<Document> {
        self.filter_builder.build_filter(query)
    }

    /// GET on the collection path
    pub async fn verb_get(&self, query: &QueryMap) -> ControllerResult<Vec<Document>> {
        let filter = self.build_filter(query)?;
        let modifiers = self.modifiers(query)?;
        log_ignored_populate(&modifiers);

        tracing::debug!(collection = self.store.name(), %filter, "find");
        let models = self.store.find(filter, modifiers.find_options()).await?;

        self.hooks.verb_get(models).await
    }

    /// GET on `path/{id}`
    pub async fn verb_get_by_id(
        &self,
        id: &str,
        query: &QueryMap,
    ) -> ControllerResult<Option<Document>> {
        let modifiers = self.modifiers(query)?;
        log_ignored_populate(&modifiers);
        let filter = id_filter(id)?;

        tracing::debug!(collection = self.store.name(), %filter, "find_one");
        let model = self
            .store
            .find_one(filter, modifiers.find_one_options())
            .await?;

        self.hooks.verb_get_by_id(model).await
    }

    /// POST on the collection path
    ///
    /// A single object is inserted as a one-element batch, an array as-is.
    pub async fn verb_post(&self, body: Value) -> ControllerResult<InsertOutcome> {
        let models = match body {
            Value::Array(items) => items
                .into_iter()
                .map(json_to_document)
                .collect::<ControllerResult<Vec<_>>>()?,
            other => vec![json_to_document(other)?],
        };

        tracing::debug!(
            collection = self.store.name(),
            count = models.len(),
            "insert_many"
        );
        let outcome = self.store.insert_many(models.clone()).await?;

        self.hooks.post_insert(&models, outcome).await
    }

    /// PUT on `path/{id}`: `$set` the body with upsert, return the new document
    ///
    /// Projection comes from the body's own `__fields`; the modifier keys are
    /// stripped before the update is built, every other field is `$set`.
    pub async fn verb_put(&self, id: &str, body: Value) -> ControllerResult<Option<Document>> {
        let Value::Object(mut param) = body else {
            return Err(ControllerError::InvalidBody {
                message: "expected a JSON object".to_string(),
            });
        };
        let filter = id_filter(id)?;
        let modifiers = Modifiers::from_body(&param)?;
        param.retain(|key, _| !MODIFIER_KEYS.contains(&key.as_str()));

        let update = json_to_document(Value::Object(param))?;
        let update = self.hooks.pre_update(id, update).await?;

        let options = UpdateOptions {
            projection: modifiers.projection(),
            upsert: true,
            return_after: true,
        };

        tracing::debug!(collection = self.store.name(), %filter, "find_one_and_update");
        let model = self
            .store
            .find_one_and_update(filter, doc! { "$set": update.clone() }, options)
            .await?;

        self.hooks.post_update(&update, model).await
    }

    /// DELETE on `path/{id}`; deleting nothing is a success
    pub async fn verb_delete(&self, id: &str) -> ControllerResult<DeleteOutcome> {
        let filter = id_filter(id)?;

        tracing::debug!(collection = self.store.name(), %filter, "delete_one");
        Ok(self.store.delete_one(filter).await?)
    }

    pub async fn verb_copy(&self, _id: &str) -> ControllerResult<()> {
        Err(ControllerError::NotImplemented {
            verb: "COPY".to_string(),
        })
    }

    pub async fn verb_patch(&self, _id: &str, _body: Value) -> ControllerResult<()> {
        Err(ControllerError::NotImplemented {
            verb: "PATCH".to_string(),
        })
    }
}

/// `{_id: ObjectId(id)}`
fn id_filter(id: &str) -> ControllerResult<Document> {
    let oid = ObjectId::parse_str(id).map_err(|_| ControllerError::InvalidId {
        id: id.to_string(),
    })?;
    Ok(doc! { "_id": oid })
}

/// Convert a JSON object body into a BSON document
fn json_to_document(json: Value) -> ControllerResult<Document> {
    match mongodb::bson::to_bson(&json)? {
        Bson::Document(d) => Ok(d),
        other => Err(ControllerError::InvalidBody {
            message: format!("expected a JSON object, got {:?}", other.element_type()),
        }),
    }
}

fn log_ignored_populate(modifiers: &Modifiers) {
    if !modifiers.populate.is_empty() {
        tracing::debug!(populate = ?modifiers.populate, "populate is not supported by the store, ignoring");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStore;
    use async_trait::async_trait;
    use serde_json::json;

    fn controller() -> (CommonController, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new("items"));
        (CommonController::new(store.clone()), store)
    }

    #[tokio::test]
    async fn test_post_single_object_inserts_one() {
        let (controller, store) = controller();
        let outcome = controller
            .verb_post(json!({ "name": "Widget" }))
            .await
            .unwrap();
        assert_eq!(outcome.inserted_count, 1);
        assert_eq!(store.len().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_post_array_inserts_batch() {
        let (controller, store) = controller();
        let outcome = controller
            .verb_post(json!([{ "name": "a" }, { "name": "b" }, { "name": "c" }]))
            .await
            .unwrap();
        assert_eq!(outcome.inserted_count, 3);
        assert_eq!(outcome.inserted_ids.len(), 3);
        assert_eq!(store.len().unwrap(), 3);
    }

    #[tokio::test]
    async fn test_post_rejects_scalars() {
        let (controller, _) = controller();
        let err = controller.verb_post(json!("nope")).await.unwrap_err();
        assert_eq!(err.error_code(), "INVALID_BODY");

        let err = controller.verb_post(json!([{ "a": 1 }, 2])).await.unwrap_err();
        assert_eq!(err.error_code(), "INVALID_BODY");
    }

    #[tokio::test]
    async fn test_get_filters_and_limits() {
        let (controller, _) = controller();
        controller
            .verb_post(json!([
                { "status": "active", "price": 5 },
                { "status": "active", "price": 15 },
                { "status": "active", "price": 25 },
                { "status": "active", "price": 35 },
                { "status": "retired", "price": 50 }
            ]))
            .await
            .unwrap();

        let query = QueryMap::from_pairs([
            ("status", "active"),
            ("__limit", "2"),
            ("price__json", r#"{"$gt":10}"#),
        ]);
        let models = controller.verb_get(&query).await.unwrap();
        assert_eq!(models.len(), 2);
        for model in &models {
            assert_eq!(model.get_str("status").unwrap(), "active");
            assert!(model.get_i64("price").unwrap() > 10);
        }
    }

    #[tokio::test]
    async fn test_get_by_id_malformed_id() {
        let (controller, _) = controller();
        let err = controller
            .verb_get_by_id("not-an-object-id", &QueryMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ControllerError::InvalidId { .. }));
    }

    #[tokio::test]
    async fn test_put_upserts_missing_document() {
        let (controller, store) = controller();
        let id = ObjectId::new();

        let model = controller
            .verb_put(&id.to_hex(), json!({ "name": "Fresh", "__fields": "[\"name\"]" }))
            .await
            .unwrap()
            .expect("upsert returns the new document");

        assert_eq!(model.get_object_id("_id").unwrap(), id);
        assert_eq!(model.get_str("name").unwrap(), "Fresh");
        assert_eq!(store.len().unwrap(), 1);

        // Reserved keys never reach the stored document
        let stored = store.snapshot().unwrap();
        assert!(!stored[0].contains_key("__fields"));
    }

    #[tokio::test]
    async fn test_delete_missing_is_zero_count() {
        let (controller, _) = controller();
        let outcome = controller
            .verb_delete(&ObjectId::new().to_hex())
            .await
            .unwrap();
        assert_eq!(outcome.deleted_count, 0);
    }

    #[tokio::test]
    async fn test_copy_and_patch_are_not_implemented() {
        let (controller, _) = controller();
        let id = ObjectId::new().to_hex();
        assert!(matches!(
            controller.verb_copy(&id).await,
            Err(ControllerError::NotImplemented { .. })
        ));
        assert!(matches!(
            controller.verb_patch(&id, json!({})).await,
            Err(ControllerError::NotImplemented { .. })
        ));
    }

    struct RenameOnUpdate;

    #[async_trait]
    impl ControllerHooks for RenameOnUpdate {
        async fn pre_update(&self, _id: &str, mut update: Document) -> ControllerResult<Document> {
            update.insert("name", "renamed");
            Ok(update)
        }

        async fn post_update(
            &self,
            update: &Document,
            model: Option<Document>,
        ) -> ControllerResult<Option<Document>> {
            let mut model = model.unwrap_or_default();
            model.insert("applied", update.clone());
            Ok(Some(model))
        }
    }

    #[tokio::test]
    async fn test_update_hooks_see_transformed_payload() {
        let store = Arc::new(InMemoryStore::new("items"));
        let controller = CommonController::new(store).with_hooks(Arc::new(RenameOnUpdate));

        let model = controller
            .verb_put(&ObjectId::new().to_hex(), json!({ "name": "original" }))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(model.get_str("name").unwrap(), "renamed");
        assert_eq!(
            model.get_document("applied").unwrap(),
            &doc! { "name": "renamed" }
        );
    }
}
