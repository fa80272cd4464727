//! Query-string → store filter translation
//!
//! Every non-reserved key of a [`QueryMap`] becomes one filter clause:
//!
//! - `field__regex=/pat/` → `{field: {"$regex": "pat"}}` (all `/` removed)
//! - `field__json={"$gt":10}` → `{field: {"$gt": 10}}` (decoded JSON)
//! - `field=value` → `{field: "value"}` (string equality, no coercion)

use crate::core::error::{ControllerError, ControllerResult};
use crate::core::query::{DEFAULT_RESERVED_KEYS, MODIFIER_KEYS, QueryMap, QueryValue};
use mongodb::bson::{Bson, Document, doc};
use std::collections::HashSet;

pub const REGEX_SUFFIX: &str = "__regex";
pub const JSON_SUFFIX: &str = "__json";

/// Builds store filters from query maps
#[derive(Debug, Clone)]
pub struct FilterBuilder {
    reserved_keys: HashSet<String>,
}

impl Default for FilterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FilterBuilder {
    /// Builder with the default reserved keys
    pub fn new() -> Self {
        Self::with_reserved_keys(DEFAULT_RESERVED_KEYS)
    }

    /// Builder reserving `keys` on top of the modifier keys
    ///
    /// The modifier keys (`__fields`, `__populate`, `__sort`, `__limit`,
    /// `__skip`) are always reserved.
    pub fn with_reserved_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut reserved_keys: HashSet<String> =
            MODIFIER_KEYS.iter().map(|k| k.to_string()).collect();
        reserved_keys.extend(keys.into_iter().map(Into::into));
        Self { reserved_keys }
    }

    pub fn is_reserved(&self, key: &str) -> bool {
        self.reserved_keys.contains(key)
    }

    /// Translate every non-reserved key of `query` into a filter clause
    ///
    /// Fails only when a `__json` value is not valid JSON or has no BSON form.
    pub fn build_filter(&self, query: &QueryMap) -> ControllerResult<Document> {
        let mut filter = Document::new();

        for (key, value) in query.iter() {
            if self.is_reserved(key) {
                continue;
            }

            if let Some(field) = key.strip_suffix(REGEX_SUFFIX) {
                filter.insert(field, regex_clause(value.last()));
            } else if let Some(field) = key.strip_suffix(JSON_SUFFIX) {
                filter.insert(field, json_clause(key, value.last())?);
            } else {
                filter.insert(key, equality_clause(value));
            }
        }

        Ok(filter)
    }
}

fn regex_clause(raw: &str) -> Document {
    doc! { "$regex": raw.replace('/', "") }
}

fn json_clause(key: &str, raw: &str) -> ControllerResult<Bson> {
    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(|e| ControllerError::decode(key, e))?;
    mongodb::bson::to_bson(&value).map_err(|e| ControllerError::decode(key, e))
}

fn equality_clause(value: &QueryValue) -> Bson {
    match value {
        QueryValue::Single(s) => Bson::String(s.clone()),
        QueryValue::Many(values) => {
            Bson::Array(values.iter().cloned().map(Bson::String).collect())
        }
    }
}
