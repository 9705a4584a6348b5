//! Conversion between JSON records and people.
//!
//! Nested objects flatten to dotted keys (`address.city`). Arrays of scalars
//! are joined with commas. Arrays of objects are only kept when configured as
//! a [`RepeatedField`], in which case each entry becomes a compound key.

use peoplesync_connector::person::{AttributeKey, Attributes, Person};
use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::config::RepeatedField;

/// Extract the array of records from a list response.
///
/// Without a path the body is either the array itself or a single record.
pub fn extract_results(body: &Value, results_path: Option<&str>) -> Option<Vec<Value>> {
    match results_path {
        Some(path) => body
            .pointer(&pointer(path))
            .and_then(Value::as_array)
            .cloned(),
        None => match body {
            Value::Array(items) => Some(items.clone()),
            Value::Object(_) => Some(vec![body.clone()]),
            _ => None,
        },
    }
}

fn pointer(dotted: &str) -> String {
    format!("/{}", dotted.replace('.', "/"))
}

/// Flatten a JSON record into attributes.
pub fn flatten(record: &Value, repeated: &[RepeatedField]) -> Attributes {
    let mut attributes = Attributes::new();
    if let Value::Object(map) = record {
        flatten_into(&mut attributes, "", map, repeated);
    }
    attributes
}

fn flatten_into(
    attributes: &mut Attributes,
    prefix: &str,
    map: &Map<String, Value>,
    repeated: &[RepeatedField],
) {
    for (key, value) in map {
        let name = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };

        match value {
            Value::Null => {}
            Value::Object(nested) => flatten_into(attributes, &name, nested, repeated),
            Value::Array(items) => {
                if let Some(field) = repeated.iter().find(|f| f.field == name) {
                    flatten_repeated(attributes, field, items);
                } else if items.iter().all(is_scalar) {
                    let joined: Vec<String> = items.iter().filter_map(scalar).collect();
                    attributes.insert(name, joined.join(","));
                } else {
                    trace!(field = %name, "Skipping array of objects");
                }
            }
            _ => {
                if let Some(text) = scalar(value) {
                    attributes.insert(name, text);
                }
            }
        }
    }
}

fn flatten_repeated(attributes: &mut Attributes, field: &RepeatedField, items: &[Value]) {
    for item in items {
        let discriminator = item.get(&field.discriminator).and_then(scalar);
        let value = item.get(&field.value).and_then(scalar);
        match (discriminator, value) {
            (Some(discriminator), Some(value)) => {
                attributes.insert_repeated(field.prefix(), &discriminator, value);
            }
            _ => debug!(field = %field.field, "Repeated entry without discriminator or value"),
        }
    }
}

fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_))
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Build a person from a listed record.
///
/// Returns `None` when the record has no value for `compare_attribute`.
pub fn to_person(
    record: &Value,
    compare_attribute: &str,
    id_field: &str,
    repeated: &[RepeatedField],
) -> Option<Person> {
    let attributes = flatten(record, repeated);
    let compare_value = attributes
        .get(compare_attribute)
        .filter(|v| !v.is_empty())?
        .to_string();

    Some(Person {
        id: attributes.get_or_empty(id_field).to_string(),
        compare_value,
        attributes,
        disable_changes: false,
    })
}

/// Build the JSON body written for a person.
///
/// Dotted keys nest again and compound keys of a configured repeated field
/// become an array of objects. The compare attribute is always present.
pub fn to_body(person: &Person, compare_attribute: &str, repeated: &[RepeatedField]) -> Value {
    let mut body = Map::new();
    let mut arrays: Vec<(&RepeatedField, Vec<Value>)> = Vec::new();

    for (key, value) in person.attributes.iter() {
        let parsed = AttributeKey::parse(key);
        if let Some(discriminator) = parsed.discriminator {
            if let Some(field) = repeated.iter().find(|f| f.prefix() == parsed.prefix) {
                let mut entry = Map::new();
                entry.insert(
                    field.discriminator.clone(),
                    Value::String(discriminator.to_string()),
                );
                entry.insert(field.value.clone(), Value::String(value.clone()));

                match arrays.iter().position(|(f, _)| f.field == field.field) {
                    Some(index) => arrays[index].1.push(Value::Object(entry)),
                    None => arrays.push((field, vec![Value::Object(entry)])),
                }
                continue;
            }
        }
        insert_dotted(&mut body, key, Value::String(value.clone()));
    }

    for (field, entries) in arrays {
        insert_dotted(&mut body, &field.field, Value::Array(entries));
    }

    if person.attributes.get(compare_attribute).is_none() {
        insert_dotted(
            &mut body,
            compare_attribute,
            Value::String(person.compare_value.clone()),
        );
    }

    Value::Object(body)
}

fn insert_dotted(target: &mut Map<String, Value>, key: &str, value: Value) {
    match key.split_once('.') {
        Some((head, rest)) => {
            let slot = target
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            if let Value::Object(nested) = slot {
                insert_dotted(nested, rest, value);
            }
        }
        None => {
            target.insert(key.to_string(), value);
        }
    }
}
