//! Field storage keys.
//!
//! A field is stored under its name followed by its evaluated arguments, sorted by argument
//! name: `hero(episode:"JEDI")`. Strings are quoted and escaped as in JSON. Arguments whose
//! variable is not provided are left out, nested input objects are sorted the same way.

use std::fmt::Write;

use crate::json_ext::Object;
use crate::json_ext::Value;
use crate::spec::Field;

/// Computes the key under which `field` is stored in its record.
pub fn field_storage_key(field: &Field, variables: &Object) -> String {
    let mut arguments: Vec<(&str, Value)> = field
        .arguments
        .iter()
        .filter_map(|(name, value)| {
            value
                .evaluate(variables)
                .map(|value| (name.as_str(), value))
        })
        .collect();

    if arguments.is_empty() {
        return field.name.clone();
    }
    arguments.sort_by(|(a, _), (b, _)| a.cmp(b));

    let mut key = format!("{}(", field.name);
    for (index, (name, value)) in arguments.iter().enumerate() {
        if index > 0 {
            key.push(',');
        }
        key.push_str(name);
        key.push(':');
        write_value(&mut key, value);
    }
    key.push(')');
    key
}

fn write_value(key: &mut String, value: &Value) {
    match value {
        Value::Null => key.push_str("null"),
        Value::Bool(b) => {
            let _ = write!(key, "{b}");
        }
        Value::Number(n) => {
            let _ = write!(key, "{n}");
        }
        Value::String(s) => {
            let _ = write!(key, "{}", serde_json::Value::from(s.as_str()));
        }
        Value::Array(values) => {
            key.push('[');
            for (index, value) in values.iter().enumerate() {
                if index > 0 {
                    key.push_str(", ");
                }
                write_value(key, value);
            }
            key.push(']');
        }
        Value::Object(object) => {
            let mut entries: Vec<_> = object.iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.as_str().cmp(b.as_str()));

            key.push('[');
            for (index, (name, value)) in entries.into_iter().enumerate() {
                if index > 0 {
                    key.push(',');
                }
                key.push_str(name.as_str());
                key.push(':');
                write_value(key, value);
            }
            key.push(']');
        }
    }
}
