//! Query-language evaluation for the in-memory store
//!
//! Covers what the controller can emit: equality (with array membership),
//! `$eq $ne $gt $gte $lt $lte $in $nin $exists $regex/$options`, the
//! logical `$and $or $nor`, dotted paths, projections, sorts and `$set` /
//! `$unset` updates.

use crate::core::store::{StoreError, StoreResult};
use mongodb::bson::{Bson, Document};
use regex::Regex;
use std::cmp::Ordering;

const MAX_PATH_DEPTH: usize = 32;

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

/// Whether `doc` satisfies every clause of `filter`
pub(crate) fn matches(doc: &Document, filter: &Document) -> StoreResult<bool> {
    for (key, condition) in filter {
        let ok = match key.as_str() {
            "$and" => logical(doc, key, condition)?.iter().all(|m| *m),
            "$or" => logical(doc, key, condition)?.iter().any(|m| *m),
            "$nor" => !logical(doc, key, condition)?.iter().any(|m| *m),
            op if op.starts_with('$') => {
                return Err(StoreError::UnsupportedOperator {
                    operator: op.to_string(),
                });
            }
            path => field_matches(get_path(doc, path), condition)?,
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

fn logical(doc: &Document, op: &str, condition: &Bson) -> StoreResult<Vec<bool>> {
    let Bson::Array(clauses) = condition else {
        return Err(StoreError::InvalidQuery {
            message: format!("{} expects an array", op),
        });
    };
    clauses
        .iter()
        .map(|clause| match clause {
            Bson::Document(sub) => matches(doc, sub),
            _ => Err(StoreError::InvalidQuery {
                message: format!("{} entries must be documents", op),
            }),
        })
        .collect()
}

fn is_operator_document(condition: &Bson) -> bool {
    match condition {
        Bson::Document(d) => !d.is_empty() && d.keys().all(|k| k.starts_with('$')),
        _ => false,
    }
}

fn field_matches(value: Option<&Bson>, condition: &Bson) -> StoreResult<bool> {
    if !is_operator_document(condition) {
        return Ok(equals(value, condition));
    }
    let Bson::Document(ops) = condition else {
        return Ok(false);
    };

    for (op, operand) in ops {
        let ok = match op.as_str() {
            "$eq" => equals(value, operand),
            "$ne" => !equals(value, operand),
            "$gt" => compares(value, operand, |o| o == Ordering::Greater),
            "$gte" => compares(value, operand, |o| o != Ordering::Less),
            "$lt" => compares(value, operand, |o| o == Ordering::Less),
            "$lte" => compares(value, operand, |o| o != Ordering::Greater),
            "$in" => in_set(value, operand)?,
            "$nin" => !in_set(value, operand)?,
            "$exists" => value.is_some() == truthy(operand),
            "$regex" => regex_matches(value, operand, ops.get_str("$options").ok())?,
            "$options" => true,
            other => {
                return Err(StoreError::UnsupportedOperator {
                    operator: other.to_string(),
                });
            }
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Equality with array membership: `{tags: "a"}` matches `tags: ["a", "b"]`
fn equals(value: Option<&Bson>, target: &Bson) -> bool {
    match value {
        None => matches!(target, Bson::Null),
        Some(v) => {
            if scalar_eq(v, target) {
                return true;
            }
            match v {
                Bson::Array(items) => items.iter().any(|item| scalar_eq(item, target)),
                _ => false,
            }
        }
    }
}

fn scalar_eq(a: &Bson, b: &Bson) -> bool {
    if is_number(a) && is_number(b) {
        return as_f64(a) == as_f64(b);
    }
    a == b
}

fn compares(value: Option<&Bson>, operand: &Bson, accept: impl Fn(Ordering) -> bool) -> bool {
    let check = |v: &Bson| same_bracket(v, operand) && accept(compare_bson(v, operand));
    match value {
        None => false,
        Some(Bson::Array(items)) if !matches!(operand, Bson::Array(_)) => items.iter().any(check),
        Some(v) => check(v),
    }
}

fn in_set(value: Option<&Bson>, operand: &Bson) -> StoreResult<bool> {
    let Bson::Array(candidates) = operand else {
        return Err(StoreError::InvalidQuery {
            message: "$in/$nin expects an array".to_string(),
        });
    };
    Ok(candidates.iter().any(|c| equals(value, c)))
}

fn regex_matches(value: Option<&Bson>, operand: &Bson, options: Option<&str>) -> StoreResult<bool> {
    let (pattern, inline_options) = match operand {
        Bson::String(p) => (p.as_str(), ""),
        Bson::RegularExpression(re) => (re.pattern.as_str(), re.options.as_str()),
        _ => {
            return Err(StoreError::InvalidQuery {
                message: "$regex expects a string".to_string(),
            });
        }
    };
    let re = compile_regex(pattern, options.unwrap_or(inline_options))?;

    Ok(match value {
        Some(Bson::String(s)) => re.is_match(s),
        Some(Bson::Array(items)) => items
            .iter()
            .any(|item| matches!(item, Bson::String(s) if re.is_match(s))),
        _ => false,
    })
}

fn compile_regex(pattern: &str, options: &str) -> StoreResult<Regex> {
    let flags: String = options
        .chars()
        .filter(|c| matches!(c, 'i' | 'm' | 's' | 'x'))
        .collect();
    let source = if flags.is_empty() {
        pattern.to_string()
    } else {
        format!("(?{}){}", flags, pattern)
    };
    Regex::new(&source).map_err(|e| StoreError::InvalidQuery {
        message: format!("invalid regular expression '{}': {}", pattern, e),
    })
}

fn truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(b) => *b,
        Bson::Null => false,
        v if is_number(v) => as_f64(v) != 0.0,
        _ => true,
    }
}

// ---------------------------------------------------------------------------
// Ordering
// ---------------------------------------------------------------------------

fn is_number(v: &Bson) -> bool {
    matches!(v, Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_))
}

fn as_f64(v: &Bson) -> f64 {
    match v {
        Bson::Int32(i) => *i as f64,
        Bson::Int64(i) => *i as f64,
        Bson::Double(f) => *f,
        _ => f64::NAN,
    }
}

/// Range operators only compare values of the same kind
fn same_bracket(a: &Bson, b: &Bson) -> bool {
    (is_number(a) && is_number(b)) || type_rank(a) == type_rank(b)
}

pub(crate) fn compare_bson(a: &Bson, b: &Bson) -> Ordering {
    if is_number(a) && is_number(b) {
        return as_f64(a).total_cmp(&as_f64(b));
    }
    match (a, b) {
        (Bson::String(x), Bson::String(y)) => x.cmp(y),
        (Bson::Boolean(x), Bson::Boolean(y)) => x.cmp(y),
        (Bson::ObjectId(x), Bson::ObjectId(y)) => x.cmp(y),
        (Bson::DateTime(x), Bson::DateTime(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn type_rank(v: &Bson) -> u8 {
    match v {
        Bson::MinKey => 0,
        Bson::Null | Bson::Undefined => 1,
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_) => 2,
        Bson::String(_) | Bson::Symbol(_) => 3,
        Bson::Document(_) => 4,
        Bson::Array(_) => 5,
        Bson::Binary(_) => 6,
        Bson::ObjectId(_) => 7,
        Bson::Boolean(_) => 8,
        Bson::DateTime(_) => 9,
        Bson::Timestamp(_) => 10,
        Bson::RegularExpression(_) => 11,
        Bson::MaxKey => 255,
        _ => 12,
    }
}

/// Order two documents by a `{field: ±1}` sort specification
pub(crate) fn compare_docs(a: &Document, b: &Document, sort: &Document) -> Ordering {
    for (field, direction) in sort {
        let ord = match (get_path(a, field), get_path(b, field)) {
            (Some(x), Some(y)) => compare_bson(x, y),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => Ordering::Equal,
        };
        if ord != Ordering::Equal {
            let descending = is_number(direction) && as_f64(direction) < 0.0;
            return if descending { ord.reverse() } else { ord };
        }
    }
    Ordering::Equal
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

pub(crate) fn get_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut parts = path.split('.');
    let mut current = doc.get(parts.next()?)?;
    for (depth, part) in parts.enumerate() {
        if depth >= MAX_PATH_DEPTH {
            return None;
        }
        current = match current {
            Bson::Document(d) => d.get(part)?,
            _ => return None,
        };
    }
    Some(current)
}

pub(crate) fn set_path(doc: &mut Document, path: &str, value: Bson) -> StoreResult<()> {
    match path.split_once('.') {
        None => {
            doc.insert(path, value);
            Ok(())
        }
        Some((head, rest)) => {
            if !matches!(doc.get(head), Some(Bson::Document(_))) {
                if doc.contains_key(head) {
                    return Err(StoreError::InvalidDocument {
                        message: format!("cannot create field '{}' inside a non-document", rest),
                    });
                }
                doc.insert(head, Document::new());
            }
            match doc.get_mut(head) {
                Some(Bson::Document(child)) => set_path(child, rest, value),
                _ => Ok(()),
            }
        }
    }
}

/// Write `value` at a dotted path of a projection, replacing any
/// non-document parent with an empty one
fn include_path(out: &mut Document, path: &str, value: Bson) {
    match path.split_once('.') {
        None => {
            out.insert(path, value);
        }
        Some((head, rest)) => {
            if !matches!(out.get(head), Some(Bson::Document(_))) {
                out.insert(head, Document::new());
            }
            if let Some(Bson::Document(child)) = out.get_mut(head) {
                include_path(child, rest, value);
            }
        }
    }
}

fn remove_path(doc: &mut Document, path: &str) {
    match path.split_once('.') {
        None => {
            doc.remove(path);
        }
        Some((head, rest)) => {
            if let Some(Bson::Document(child)) = doc.get_mut(head) {
                remove_path(child, rest);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Projection
// ---------------------------------------------------------------------------

/// Apply an inclusion (`{a: 1}`) or exclusion (`{a: 0}`) projection
///
/// `_id` is kept unless explicitly excluded.
pub(crate) fn project(doc: &Document, projection: &Document) -> Document {
    let inclusive = projection
        .iter()
        .any(|(field, flag)| field != "_id" && truthy(flag));
    let keep_id = projection.get("_id").is_none_or(truthy);

    if inclusive {
        let mut out = Document::new();
        if keep_id && let Some(id) = doc.get("_id") {
            out.insert("_id", id.clone());
        }
        for (field, flag) in projection {
            if field == "_id" || !truthy(flag) {
                continue;
            }
            if let Some(value) = get_path(doc, field) {
                include_path(&mut out, field, value.clone());
            }
        }
        out
    } else {
        let mut out = doc.clone();
        for (field, _) in projection {
            if field == "_id" && keep_id {
                continue;
            }
            remove_path(&mut out, field);
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Updates
// ---------------------------------------------------------------------------

/// Apply an update document made of `$set` / `$unset` operators
pub(crate) fn apply_update(doc: &mut Document, update: &Document) -> StoreResult<()> {
    for (op, operand) in update {
        let Bson::Document(fields) = operand else {
            return Err(StoreError::InvalidQuery {
                message: format!("{} expects a document", op),
            });
        };
        match op.as_str() {
            "$set" => {
                for (path, value) in fields {
                    set_path(doc, path, value.clone())?;
                }
            }
            "$unset" => {
                for (path, _) in fields {
                    remove_path(doc, path);
                }
            }
            other if other.starts_with('$') => {
                return Err(StoreError::UnsupportedOperator {
                    operator: other.to_string(),
                });
            }
            other => {
                return Err(StoreError::InvalidQuery {
                    message: format!("update field '{}' is not an operator", other),
                });
            }
        }
    }
    Ok(())
}

/// Seed a new document from the equality clauses of an upsert filter
pub(crate) fn upsert_seed(filter: &Document) -> StoreResult<Document> {
    let mut seed = Document::new();
    for (key, condition) in filter {
        if key.starts_with('$') {
            continue;
        }
        match condition {
            Bson::Document(ops) if is_operator_document(condition) => {
                if let Some(value) = ops.get("$eq") {
                    set_path(&mut seed, key, value.clone())?;
                }
            }
            value => set_path(&mut seed, key, value.clone())?,
        }
    }
    Ok(seed)
}
