use serde::Deserialize;
use serde::Serialize;

use crate::error::DecodingError;
use crate::json_ext::Value;

/// The declared type of a field.
///
/// Primitives are taken from scalars: <https://spec.graphql.org/draft/#sec-Scalars>
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    /// Named type {0}: an object, interface, union, enum or custom scalar.
    Named(String),
    /// List type {0}
    List(Box<FieldType>),
    /// Non null type {0}
    NonNull(Box<FieldType>),
    /// String
    String,
    /// Int
    Int,
    /// Float
    Float,
    /// Id
    Id,
    /// Boolean
    Boolean,
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldType::Named(ty) => write!(f, "{ty}"),
            FieldType::List(ty) => write!(f, "[{ty}]"),
            FieldType::NonNull(ty) => write!(f, "{ty}!"),
            FieldType::String => write!(f, "String"),
            FieldType::Int => write!(f, "Int"),
            FieldType::Float => write!(f, "Float"),
            FieldType::Id => write!(f, "ID"),
            FieldType::Boolean => write!(f, "Boolean"),
        }
    }
}

impl FieldType {
    pub fn named(name: impl Into<String>) -> Self {
        FieldType::Named(name.into())
    }

    pub fn non_null(self) -> Self {
        FieldType::NonNull(Box::new(self))
    }

    pub fn list(self) -> Self {
        FieldType::List(Box::new(self))
    }

    pub fn is_non_null(&self) -> bool {
        matches!(self, FieldType::NonNull(_))
    }

    /// The type without its outermost non-null wrapper.
    pub fn nullable(&self) -> &FieldType {
        match self {
            FieldType::NonNull(inner) => inner,
            other => other,
        }
    }

    /// The innermost named type, e.g. `Character` for `[Character!]!`.
    pub fn inner_type_name(&self) -> String {
        match self {
            FieldType::List(inner) | FieldType::NonNull(inner) => inner.inner_type_name(),
            other => other.to_string(),
        }
    }

    /// Checks that a leaf value has the shape of this (nullable, non list) scalar type.
    ///
    /// Named leaf types (enums and custom scalars) are passed through unchanged, we cannot
    /// know about their expected format.
    pub(crate) fn coerce_leaf(&self, value: Value) -> Result<Value, DecodingError> {
        let valid = match self.nullable() {
            FieldType::Int => value
                .as_i64()
                .and_then(|i| i32::try_from(i).ok())
                .is_some(),
            FieldType::Float => value.as_f64().is_some(),
            FieldType::Boolean => value.as_bool().is_some(),
            FieldType::String => value.is_string(),
            // In practice Int works too
            FieldType::Id => value.is_string() || value.is_i64() || value.is_u64(),
            FieldType::Named(_) => true,
            FieldType::List(_) | FieldType::NonNull(_) => false,
        };

        if valid {
            Ok(value)
        } else {
            Err(DecodingError::CouldNotConvert {
                value: serde_json::to_string(&value).unwrap_or_default(),
                expected: self.nullable().to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json_bytes::json;

    use super::*;

    #[test]
    fn display_wrapping_types() {
        let ty = FieldType::named("Character").non_null().list().non_null();
        assert_eq!(ty.to_string(), "[Character!]!");
        assert_eq!(ty.inner_type_name(), "Character");
        assert!(ty.is_non_null());
    }

    #[test]
    fn coerce_builtin_scalars() {
        assert_eq!(FieldType::Int.coerce_leaf(json!(42)), Ok(json!(42)));
        assert!(FieldType::Int.coerce_leaf(json!(4_294_967_296u64)).is_err());
        assert!(FieldType::String.coerce_leaf(json!(12)).is_err());
        assert_eq!(FieldType::Id.coerce_leaf(json!(2001)), Ok(json!(2001)));
        assert_eq!(
            FieldType::named("Episode").coerce_leaf(json!("JEDI")),
            Ok(json!("JEDI"))
        );
    }
}
