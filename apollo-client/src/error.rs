//! Client errors.
use bytes::Bytes;
use displaydoc::Display;
use heck::ToShoutySnakeCase;
use serde_json_bytes::ByteString;
use thiserror::Error;

use crate::graphql;
use crate::json_ext::Object;
use crate::json_ext::Path;
use crate::json_ext::Value;

/// Errors raised while decoding a single value.
#[derive(Error, Display, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DecodingError {
    /// missing value
    MissingValue,

    /// null value for a non-null field
    NullValue,

    /// could not convert {value} to {expected}
    CouldNotConvert {
        /// The value found, as JSON.
        value: String,
        /// The expected type.
        expected: String,
    },
}

/// Errors raised by the execution engine.
#[derive(Error, Display, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ExecutionError {
    /// error at path '{path}': {error}
    Decoding {
        /// The response path of the field that failed.
        path: Path,
        /// The underlying decoding error.
        error: DecodingError,
    },

    /// could not load records: {reason}
    Loading {
        /// The reason the records could not be loaded.
        reason: String,
    },
}

impl ExecutionError {
    pub(crate) fn decoding(path: &Path, error: DecodingError) -> Self {
        ExecutionError::Decoding {
            path: path.clone(),
            error,
        }
    }

    /// Returns true when the error only says that a value was absent from the source.
    ///
    /// Reads through the cache report these as cache misses.
    pub fn is_missing_value(&self) -> bool {
        matches!(
            self,
            ExecutionError::Decoding {
                error: DecodingError::MissingValue | DecodingError::NullValue,
                ..
            }
        )
    }
}

/// Errors raised by the cache store.
#[derive(Error, Display, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CacheError {
    /// {0}
    Execution(#[from] ExecutionError),
}

/// Errors in the client configuration.
#[derive(Error, Display, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigurationError {
    /// invalid value for '{field}': {reason}
    InvalidValue {
        /// The configuration field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

/// Error types for the request pipeline.
///
/// Note that these are not sent over the wire; [`FetchError::to_graphql_error`] converts them
/// into GraphQL errors when a response has to carry them.
#[derive(Error, Display, Debug, Clone)]
#[ignore_extra_doc_attributes]
#[non_exhaustive]
pub enum FetchError {
    /// received invalid response code: {status}
    ///
    /// any status outside of the 2xx range is terminal
    InvalidResponseCode {
        /// The HTTP status code.
        status: u16,
        /// The raw response body.
        body: Bytes,
        /// GraphQL errors that could be extracted from the body.
        graphql_errors: Vec<graphql::Error>,
    },

    /// operation '{operation_name}' hit the max retry limit of {max_retries}
    RetriedTooManyTimes {
        /// The operation that was retried.
        operation_name: String,
        /// The configured limit.
        max_retries: usize,
    },

    /// persisted query retry failed for operation '{operation_name}'
    PersistedQueryRetryFailed {
        /// The operation that was sent with its document.
        operation_name: String,
    },

    /// operation '{operation_name}' has no query document to fall back to
    PersistedQueryNoDocument {
        /// The operation that only has a persisted query hash.
        operation_name: String,
    },

    /// response was malformed: {reason}
    MalformedResponse {
        /// The reason the deserialization failed.
        reason: String,
    },

    /// transport failed: {reason}
    ///
    /// note that this relates to a transport error and not a GraphQL error
    Transport {
        /// The reason the transport failed.
        reason: String,
    },

    /// could not decode response: {0}
    Decoding(ExecutionError),

    /// no cached result for operation '{operation_name}'
    CacheMiss {
        /// The operation that was read.
        operation_name: String,
    },

    /// cache store failure: {0}
    Store(#[from] CacheError),

    /// request was cancelled
    Cancelled,
}

impl FetchError {
    /// Whether the retry layer may send the request again.
    ///
    /// Only transport failures are retried, every other kind is terminal.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Transport { .. })
    }

    /// The value of the `code` extension of the GraphQL error for this error.
    pub fn extension_code(&self) -> String {
        let variant = match self {
            FetchError::InvalidResponseCode { .. } => "InvalidResponseCode",
            FetchError::RetriedTooManyTimes { .. } => "RetriedTooManyTimes",
            FetchError::PersistedQueryRetryFailed { .. } => "PersistedQueryRetryFailed",
            FetchError::PersistedQueryNoDocument { .. } => "PersistedQueryNoDocument",
            FetchError::MalformedResponse { .. } => "MalformedResponse",
            FetchError::Transport { .. } => "Transport",
            FetchError::Decoding(_) => "Decoding",
            FetchError::CacheMiss { .. } => "CacheMiss",
            FetchError::Store(_) => "Store",
            FetchError::Cancelled => "Cancelled",
        };
        variant.to_shouty_snake_case()
    }

    /// Convert the fetch error to a GraphQL error.
    pub fn to_graphql_error(&self, path: Option<Path>) -> graphql::Error {
        let mut extensions = Object::new();
        extensions.insert(
            ByteString::from("code"),
            Value::String(self.extension_code().into()),
        );
        match self {
            FetchError::InvalidResponseCode { status, .. } => {
                extensions.insert(
                    ByteString::from("http"),
                    serde_json_bytes::json!({ "status": status }),
                );
            }
            FetchError::RetriedTooManyTimes {
                operation_name,
                max_retries,
            } => {
                extensions.insert(
                    ByteString::from("operationName"),
                    Value::String(operation_name.as_str().into()),
                );
                extensions.insert(
                    ByteString::from("maxRetries"),
                    Value::from(*max_retries as u64),
                );
            }
            _ => {}
        }

        graphql::Error {
            message: self.to_string(),
            path,
            extensions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_exhaustion_names_the_operation() {
        let error = FetchError::RetriedTooManyTimes {
            operation_name: "HeroName".to_string(),
            max_retries: 2,
        };
        assert_eq!(
            error.to_string(),
            "operation 'HeroName' hit the max retry limit of 2"
        );

        let graphql_error = error.to_graphql_error(None);
        assert_eq!(
            graphql_error.extensions.get("code"),
            Some(&Value::String("RETRIED_TOO_MANY_TIMES".into()))
        );
        assert_eq!(
            graphql_error.extensions.get("maxRetries"),
            Some(&Value::from(2u64))
        );
    }

    #[test]
    fn only_transport_errors_are_retryable() {
        assert!(FetchError::Transport {
            reason: "connection reset".to_string()
        }
        .is_retryable());
        assert!(!FetchError::InvalidResponseCode {
            status: 500,
            body: Bytes::new(),
            graphql_errors: Vec::new(),
        }
        .is_retryable());
        assert!(!FetchError::Cancelled.is_retryable());
    }

    #[test]
    fn missing_values_are_distinguished_from_conversion_failures() {
        let missing =
            ExecutionError::decoding(&Path::from(vec!["hero"]), DecodingError::MissingValue);
        assert!(missing.is_missing_value());

        let corrupted = ExecutionError::decoding(
            &Path::from(vec!["hero", "name"]),
            DecodingError::CouldNotConvert {
                value: "12".to_string(),
                expected: "String".to_string(),
            },
        );
        assert!(!corrupted.is_missing_value());
        assert_eq!(
            corrupted.to_string(),
            "error at path 'hero/name': could not convert 12 to String"
        );
    }
}
