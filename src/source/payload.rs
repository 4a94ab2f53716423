//! Payload decoding
//!
//! Metadata endpoints are loosely typed. A payload may be an array of
//! record objects, an object keyed by record name, or an envelope object
//! wrapping either. This module flattens all of those into [`RawRecord`]s
//! without ever failing on an individual malformed record.

use serde_json::{Map, Value};
use tracing::warn;

use crate::error::SourceError;
use crate::model::{Collection, RawRecord};

/// Envelope fields that hold records, per collection, in lookup order.
fn envelope_fields(collection: Collection) -> &'static [&'static str] {
    match collection {
        Collection::Operations => &["operations", "chains"],
        Collection::DocumentTypes => &["doctypes", "docTypes", "types"],
        Collection::Schemas => &["schemas"],
        Collection::Facets => &["facets"],
    }
}

/// Decode one collection payload into records, in payload order.
///
/// Object-keyed payloads are iterated in key order, which `serde_json`
/// keeps sorted.
pub fn decode_records(collection: Collection, payload: &Value) -> Result<Vec<RawRecord>, SourceError> {
    let mut records = Vec::new();

    match payload {
        Value::Array(items) => decode_array(collection, items, &mut records),
        Value::Object(map) => {
            let envelopes: Vec<&Value> = envelope_fields(collection)
                .iter()
                .filter_map(|field| map.get(*field))
                .collect();

            if envelopes.is_empty() {
                decode_keyed(collection, map, &mut records);
            } else {
                for envelope in envelopes {
                    match envelope {
                        Value::Array(items) => decode_array(collection, items, &mut records),
                        Value::Object(inner) => decode_keyed(collection, inner, &mut records),
                        other => {
                            return Err(SourceError::Payload(format!(
                                "{} envelope holds {}, expected array or object",
                                collection,
                                type_name(other)
                            )))
                        }
                    }
                }
            }
        }
        other => {
            return Err(SourceError::Payload(format!(
                "{} payload is {}, expected array or object",
                collection,
                type_name(other)
            )))
        }
    }

    Ok(records)
}

fn decode_array(collection: Collection, items: &[Value], out: &mut Vec<RawRecord>) {
    for (i, item) in items.iter().enumerate() {
        match item {
            Value::Object(fields) => push_record(collection, None, fields, out),
            // Bare names, e.g. a facet list of strings
            Value::String(name) => out.push(RawRecord::new(name.clone())),
            other => warn!(
                collection = %collection,
                index = i,
                kind = type_name(other),
                "Skipping non-object record"
            ),
        }
    }
}

fn decode_keyed(collection: Collection, map: &Map<String, Value>, out: &mut Vec<RawRecord>) {
    for (name, item) in map {
        match item {
            Value::Object(fields) => push_record(collection, Some(name), fields, out),
            _ => out.push(RawRecord::new(name.clone())),
        }
    }
}

fn push_record(
    collection: Collection,
    map_key: Option<&str>,
    fields: &Map<String, Value>,
    out: &mut Vec<RawRecord>,
) {
    match record_from_fields(map_key, fields) {
        Some(record) => out.push(record),
        None => warn!(
            collection = %collection,
            "Skipping record without id, name or key"
        ),
    }
}

/// Build a record from one JSON object. `None` when no key can be found.
pub fn record_from_fields(map_key: Option<&str>, fields: &Map<String, Value>) -> Option<RawRecord> {
    let key = ["id", "name", "key"]
        .iter()
        .find_map(|f| non_empty_str(fields.get(*f)))
        .or_else(|| map_key.filter(|k| !k.trim().is_empty()).map(str::to_string))?;

    let mut alias_keys: Vec<String> = Vec::new();
    for alias in string_list(fields.get("aliases").or_else(|| fields.get("aliasKeys"))) {
        if alias != key && !alias_keys.contains(&alias) {
            alias_keys.push(alias);
        }
    }

    Some(RawRecord {
        label: non_empty_str(fields.get("label").or_else(|| fields.get("title"))),
        description: non_empty_str(fields.get("description")),
        category: non_empty_str(fields.get("category")),
        parent: non_empty_str(fields.get("parent")),
        prefix: non_empty_str(fields.get("prefix").or_else(|| fields.get("@prefix"))),
        facets: string_list(fields.get("facets")),
        schemas: string_list(fields.get("schemas")),
        alias_keys,
        key,
    })
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Strings from an array of strings or of objects carrying `name`.
fn string_list(value: Option<&Value>) -> Vec<String> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Object(fields) => non_empty_str(fields.get("name")),
            _ => None,
        })
        .filter(|s| !s.is_empty())
        .collect()
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
