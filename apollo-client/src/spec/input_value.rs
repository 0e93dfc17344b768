use indexmap::IndexMap;
use serde::Deserialize;
use serde::Serialize;
use serde_json_bytes::ByteString;

use crate::json_ext::Object;
use crate::json_ext::Value;

/// An argument value as written in the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InputValue {
    /// A literal scalar, enum value or `null`.
    Scalar(Value),
    /// A reference to an operation variable, by name without the `$`.
    Variable(String),
    List(Vec<InputValue>),
    Object(IndexMap<String, InputValue>),
}

impl InputValue {
    pub fn variable(name: impl Into<String>) -> Self {
        InputValue::Variable(name.into())
    }

    /// Resolves variables against `variables`.
    ///
    /// Returns `None` when the value is a variable that was not provided. Inside lists and
    /// objects, an unprovided variable becomes `null`.
    pub fn evaluate(&self, variables: &Object) -> Option<Value> {
        match self {
            InputValue::Scalar(value) => Some(value.clone()),
            InputValue::Variable(name) => variables.get(name.as_str()).cloned(),
            InputValue::List(values) => Some(Value::Array(
                values
                    .iter()
                    .map(|value| value.evaluate(variables).unwrap_or(Value::Null))
                    .collect(),
            )),
            InputValue::Object(fields) => Some(Value::Object(
                fields
                    .iter()
                    .filter_map(|(name, value)| {
                        value
                            .evaluate(variables)
                            .map(|value| (ByteString::from(name.as_str()), value))
                    })
                    .collect(),
            )),
        }
    }
}

impl From<Value> for InputValue {
    fn from(value: Value) -> Self {
        InputValue::Scalar(value)
    }
}

impl From<&str> for InputValue {
    fn from(value: &str) -> Self {
        InputValue::Scalar(Value::String(value.into()))
    }
}

impl From<i64> for InputValue {
    fn from(value: i64) -> Self {
        InputValue::Scalar(Value::from(value))
    }
}

impl From<bool> for InputValue {
    fn from(value: bool) -> Self {
        InputValue::Scalar(Value::Bool(value))
    }
}
