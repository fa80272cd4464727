//! Query-string model and modifier parsing
//!
//! A request's query string is held as a [`QueryMap`]: an ordered map of
//! keys to one or more raw string values. Reserved keys (`__fields`,
//! `__populate`, `__sort`, `__limit`, `__skip`) are decoded into a
//! [`Modifiers`] set, everything else feeds the filter builder.
//!
//! # Example
//! ```rust,ignore
//! let query = QueryMap::from_pairs([
//!     ("status", "active"),
//!     ("__sort", r#"{"price": -1}"#),
//!     ("__limit", "2"),
//! ]);
//! let modifiers = Modifiers::from_query(&query)?;
//! assert_eq!(modifiers.limit, 2);
//! ```

use crate::core::error::{ControllerError, ControllerResult};
use crate::core::store::{FindOneOptions, FindOptions};
use indexmap::IndexMap;
use mongodb::bson::Document;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

pub const FIELDS_KEY: &str = "__fields";
pub const POPULATE_KEY: &str = "__populate";
pub const SORT_KEY: &str = "__sort";
pub const LIMIT_KEY: &str = "__limit";
pub const SKIP_KEY: &str = "__skip";

/// Keys decoded into [`Modifiers`]
pub const MODIFIER_KEYS: [&str; 5] = [FIELDS_KEY, POPULATE_KEY, SORT_KEY, LIMIT_KEY, SKIP_KEY];

/// Keys that are never treated as filter clauses unless configured otherwise
pub const DEFAULT_RESERVED_KEYS: [&str; 6] =
    [FIELDS_KEY, POPULATE_KEY, SORT_KEY, LIMIT_KEY, SKIP_KEY, "on"];

/// One or more raw values for a query key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryValue {
    Single(String),
    /// The key was repeated (`?tag=a&tag=b`)
    Many(Vec<String>),
}

impl QueryValue {
    /// The value that wins when only one can be used
    pub fn last(&self) -> &str {
        match self {
            QueryValue::Single(s) => s,
            QueryValue::Many(values) => values.last().map(String::as_str).unwrap_or(""),
        }
    }

    fn push(&mut self, value: String) {
        match self {
            QueryValue::Single(first) => {
                let first = std::mem::take(first);
                *self = QueryValue::Many(vec![first, value]);
            }
            QueryValue::Many(values) => values.push(value),
        }
    }
}

/// Ordered key → value(s) mapping built fresh for each request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryMap {
    entries: IndexMap<String, QueryValue>,
}

impl QueryMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from raw `(key, value)` pairs, collapsing repeated keys
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut map = Self::new();
        for (key, value) in pairs {
            map.append(key, value);
        }
        map
    }

    /// Add a value, turning the entry into [`QueryValue::Many`] if the key exists
    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let value = value.into();
        match self.entries.entry(key.into()) {
            indexmap::map::Entry::Occupied(mut entry) => entry.get_mut().push(value),
            indexmap::map::Entry::Vacant(entry) => {
                entry.insert(QueryValue::Single(value));
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&QueryValue> {
        self.entries.get(key)
    }

    /// Last value for `key`
    pub fn last(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(QueryValue::last)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &QueryValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for QueryMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::from_pairs(iter)
    }
}

// =============================================================================
// Modifiers
// =============================================================================

/// Sort direction for one field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawDirection")]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDirection {
    Number(i64),
    Text(String),
}

impl TryFrom<RawDirection> for SortDirection {
    type Error = String;

    fn try_from(raw: RawDirection) -> Result<Self, Self::Error> {
        match raw {
            RawDirection::Number(1) => Ok(SortDirection::Ascending),
            RawDirection::Number(-1) => Ok(SortDirection::Descending),
            RawDirection::Number(n) => Err(format!("invalid sort direction {}", n)),
            RawDirection::Text(text) => match text.to_ascii_lowercase().as_str() {
                "asc" | "ascending" => Ok(SortDirection::Ascending),
                "desc" | "descending" => Ok(SortDirection::Descending),
                _ => Err(format!("invalid sort direction '{}'", text)),
            },
        }
    }
}

impl SortDirection {
    pub fn as_i32(self) -> i32 {
        match self {
            SortDirection::Ascending => 1,
            SortDirection::Descending => -1,
        }
    }
}

/// Pagination, projection and sort directives of a request
///
/// All members default to empty/zero; a zero `limit` means "no limit".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Modifiers {
    pub fields: Vec<String>,
    pub populate: Vec<String>,
    pub sort: IndexMap<String, SortDirection>,
    pub limit: u64,
    pub skip: u64,
}

impl Modifiers {
    /// Decode the reserved keys of a query string
    ///
    /// `__fields`, `__populate` and `__sort` are JSON text, `__limit` and
    /// `__skip` decimal text. Malformed values fail, they are never defaulted.
    pub fn from_query(query: &QueryMap) -> ControllerResult<Self> {
        Self::decode(|key| query.last(key).map(|s| Value::String(s.to_string())))
    }

    /// Decode the reserved keys of a JSON body
    ///
    /// Values may be JSON text (as in a query string) or already-structured
    /// JSON (`"__fields": ["name"]`).
    pub fn from_body(body: &Map<String, Value>) -> ControllerResult<Self> {
        Self::decode(|key| body.get(key).cloned())
    }

    fn decode(lookup: impl Fn(&str) -> Option<Value>) -> ControllerResult<Self> {
        Ok(Self {
            fields: decode_structured(FIELDS_KEY, lookup(FIELDS_KEY))?,
            populate: decode_structured(POPULATE_KEY, lookup(POPULATE_KEY))?,
            sort: decode_structured(SORT_KEY, lookup(SORT_KEY))?,
            limit: decode_count(LIMIT_KEY, lookup(LIMIT_KEY))?,
            skip: decode_count(SKIP_KEY, lookup(SKIP_KEY))?,
        })
    }

    /// `{field: 1, ...}`, or `None` when no fields were requested
    pub fn projection(&self) -> Option<Document> {
        if self.fields.is_empty() {
            return None;
        }
        let mut projection = Document::new();
        for field in &self.fields {
            projection.insert(field.clone(), 1);
        }
        Some(projection)
    }

    /// `{field: ±1, ...}` in declaration order, or `None` when unsorted
    pub fn sort_document(&self) -> Option<Document> {
        if self.sort.is_empty() {
            return None;
        }
        let mut sort = Document::new();
        for (field, direction) in &self.sort {
            sort.insert(field.clone(), direction.as_i32());
        }
        Some(sort)
    }

    pub fn find_options(&self) -> FindOptions {
        FindOptions {
            projection: self.projection(),
            sort: self.sort_document(),
            limit: (self.limit > 0).then(|| i64::try_from(self.limit).unwrap_or(i64::MAX)),
            skip: (self.skip > 0).then_some(self.skip),
        }
    }

    pub fn find_one_options(&self) -> FindOneOptions {
        FindOneOptions {
            projection: self.projection(),
            sort: self.sort_document(),
            skip: (self.skip > 0).then_some(self.skip),
        }
    }
}

fn decode_structured<T: DeserializeOwned + Default>(
    key: &str,
    value: Option<Value>,
) -> ControllerResult<T> {
    match value {
        None | Some(Value::Null) => Ok(T::default()),
        Some(Value::String(text)) if text.is_empty() => Ok(T::default()),
        Some(Value::String(text)) => {
            serde_json::from_str(&text).map_err(|e| ControllerError::decode(key, e))
        }
        Some(other) => serde_json::from_value(other).map_err(|e| ControllerError::decode(key, e)),
    }
}

fn decode_count(key: &str, value: Option<Value>) -> ControllerResult<u64> {
    match value {
        None | Some(Value::Null) => Ok(0),
        Some(Value::String(text)) => {
            let text = text.trim();
            if text.is_empty() {
                return Ok(0);
            }
            text.parse::<u64>().map_err(|e| ControllerError::decode(key, e))
        }
        Some(Value::Number(n)) => n
            .as_u64()
            .ok_or_else(|| ControllerError::decode(key, format!("{} is not a non-negative integer", n))),
        Some(other) => Err(ControllerError::decode(
            key,
            format!("expected decimal text, got {}", other),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;
    use serde_json::json;

    #[test]
    fn test_modifiers_defaults() {
        let modifiers = Modifiers::from_query(&QueryMap::new()).unwrap();
        assert!(modifiers.fields.is_empty());
        assert!(modifiers.populate.is_empty());
        assert!(modifiers.sort.is_empty());
        assert_eq!(modifiers.limit, 0);
        assert_eq!(modifiers.skip, 0);
        assert_eq!(modifiers, Modifiers::default());
    }

    #[test]
    fn test_modifiers_limit_and_skip() {
        let query = QueryMap::from_pairs([("__limit", "5"), ("__skip", "2")]);
        let modifiers = Modifiers::from_query(&query).unwrap();
        assert_eq!(modifiers.limit, 5);
        assert_eq!(modifiers.skip, 2);
    }

    #[test]
    fn test_empty_limit_is_zero() {
        let query = QueryMap::from_pairs([("__limit", ""), ("__skip", " ")]);
        let modifiers = Modifiers::from_query(&query).unwrap();
        assert_eq!(modifiers.limit, 0);
        assert_eq!(modifiers.skip, 0);
        assert_eq!(modifiers.find_options().limit, None);
    }

    #[test]
    fn test_non_decimal_limit_fails() {
        let query = QueryMap::from_pairs([("__limit", "ten")]);
        let err = Modifiers::from_query(&query).unwrap_err();
        assert!(matches!(err, ControllerError::Decode { ref key, .. } if key == "__limit"));

        let query = QueryMap::from_pairs([("__skip", "-1")]);
        assert!(Modifiers::from_query(&query).is_err());
    }

    #[test]
    fn test_fields_and_populate_decode() {
        let query = QueryMap::from_pairs([
            ("__fields", r#"["name","price"]"#),
            ("__populate", r#"["owner"]"#),
        ]);
        let modifiers = Modifiers::from_query(&query).unwrap();
        assert_eq!(modifiers.fields, vec!["name", "price"]);
        assert_eq!(modifiers.populate, vec!["owner"]);
        assert_eq!(modifiers.projection(), Some(doc! { "name": 1, "price": 1 }));
    }

    #[test]
    fn test_malformed_fields_fails() {
        let query = QueryMap::from_pairs([("__fields", "[name")]);
        let err = Modifiers::from_query(&query).unwrap_err();
        assert_eq!(err.error_code(), "DECODE_ERROR");
    }

    #[test]
    fn test_sort_keeps_declaration_order() {
        let query = QueryMap::from_pairs([("__sort", r#"{"price": -1, "name": "asc"}"#)]);
        let modifiers = Modifiers::from_query(&query).unwrap();
        let keys: Vec<&str> = modifiers.sort.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["price", "name"]);
        assert_eq!(
            modifiers.sort_document(),
            Some(doc! { "price": -1, "name": 1 })
        );
    }

    #[test]
    fn test_invalid_sort_direction_fails() {
        let query = QueryMap::from_pairs([("__sort", r#"{"price": 2}"#)]);
        assert!(Modifiers::from_query(&query).is_err());

        let query = QueryMap::from_pairs([("__sort", r#"{"price": "up"}"#)]);
        assert!(Modifiers::from_query(&query).is_err());
    }

    #[test]
    fn test_from_body_accepts_structured_values() {
        let body = json!({
            "name": "Widget",
            "__fields": ["name"],
            "__limit": 3
        });
        let modifiers = Modifiers::from_body(body.as_object().unwrap()).unwrap();
        assert_eq!(modifiers.fields, vec!["name"]);
        assert_eq!(modifiers.limit, 3);

        let body = json!({ "__fields": "[\"price\"]" });
        let modifiers = Modifiers::from_body(body.as_object().unwrap()).unwrap();
        assert_eq!(modifiers.fields, vec!["price"]);
    }

    #[test]
    fn test_repeated_keys_collapse() {
        let query = QueryMap::from_pairs([("tag", "a"), ("status", "x"), ("tag", "b")]);
        assert_eq!(query.len(), 2);
        assert_eq!(
            query.get("tag"),
            Some(&QueryValue::Many(vec!["a".to_string(), "b".to_string()]))
        );
        assert_eq!(query.last("tag"), Some("b"));
        let keys: Vec<&str> = query.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["tag", "status"]);
    }

    #[test]
    fn test_find_options_from_modifiers() {
        let query = QueryMap::from_pairs([("__limit", "2"), ("__skip", "4")]);
        let options = Modifiers::from_query(&query).unwrap().find_options();
        assert_eq!(options.limit, Some(2));
        assert_eq!(options.skip, Some(4));
        assert_eq!(options.projection, None);
        assert_eq!(options.sort, None);
    }
}
