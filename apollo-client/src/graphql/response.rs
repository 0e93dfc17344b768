use bytes::Bytes;
use serde::Deserialize;
use serde::Serialize;
use serde_json_bytes::ByteString;
use serde_json_bytes::Map;

use crate::error::FetchError;
use crate::graphql::Error;
use crate::json_ext::Object;
use crate::json_ext::Path;
use crate::json_ext::Value;

/// A GraphQL response as received from the server.
///
/// With `@defer`, the first response of a stream carries `data` and the following ones carry
/// `incremental` payloads.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct Response {
    /// The label that was passed to the defer directive for this patch.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub label: Option<String>,

    /// The response data.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub data: Option<Value>,

    /// The path that the data should be merged at.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub path: Option<Path>,

    /// The optional graphql errors encountered.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub errors: Vec<Error>,

    /// The optional graphql extensions.
    #[serde(skip_serializing_if = "Object::is_empty", default)]
    pub extensions: Object,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub has_next: Option<bool>,

    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub incremental: Vec<IncrementalResponse>,
}

#[buildstructor::buildstructor]
impl Response {
    /// Constructor
    #[builder(visibility = "pub")]
    fn new(
        label: Option<String>,
        data: Option<Value>,
        path: Option<Path>,
        errors: Vec<Error>,
        extensions: Map<ByteString, Value>,
        has_next: Option<bool>,
        incremental: Vec<IncrementalResponse>,
    ) -> Self {
        Self {
            label,
            data,
            path,
            errors,
            extensions,
            has_next,
            incremental,
        }
    }

    /// Create a [`Response`] from the supplied [`Bytes`].
    pub fn from_bytes(b: &Bytes) -> Result<Response, FetchError> {
        let value = Value::from_bytes(b.clone()).map_err(|error| FetchError::MalformedResponse {
            reason: error.to_string(),
        })?;
        let mut object =
            ensure_object!(value).map_err(|reason| FetchError::MalformedResponse { reason })?;

        let malformed = |reason: &str| FetchError::MalformedResponse {
            reason: reason.to_string(),
        };

        let data = extract_key_value_from_object!(object, "data");
        let errors = extract_key_value_from_object!(object, "errors", Value::Array(v) => v)
            .map_err(malformed)?
            .into_iter()
            .flatten()
            .map(|v| {
                Error::from_value(v).map_err(|reason| FetchError::MalformedResponse { reason })
            })
            .collect::<Result<Vec<Error>, FetchError>>()?;
        let extensions =
            extract_key_value_from_object!(object, "extensions", Value::Object(o) => o)
                .map_err(malformed)?
                .unwrap_or_default();
        let label = extract_key_value_from_object!(object, "label", Value::String(s) => s)
            .map_err(malformed)?
            .map(|s| s.as_str().to_string());
        let path = extract_key_value_from_object!(object, "path")
            .map(serde_json_bytes::from_value)
            .transpose()
            .map_err(|err| FetchError::MalformedResponse {
                reason: err.to_string(),
            })?;
        let has_next = extract_key_value_from_object!(object, "hasNext", Value::Bool(b) => b)
            .map_err(malformed)?;
        let incremental =
            extract_key_value_from_object!(object, "incremental", Value::Array(a) => a)
                .map_err(malformed)?
                .into_iter()
                .flatten()
                .map(IncrementalResponse::from_value)
                .collect::<Result<Vec<IncrementalResponse>, FetchError>>()?;

        // Graphql spec says:
        // If the data entry in the response is not present, the errors entry in the response must not be empty.
        // It must contain at least one error. The errors it contains should indicate why no data was able to be returned.
        // Subsequent payloads of an incremental stream are the exception.
        if data.is_none() && errors.is_empty() && incremental.is_empty() && has_next.is_none() {
            return Err(malformed(
                "graphql response without data must contain at least one error",
            ));
        }

        Ok(Response {
            label,
            data,
            path,
            errors,
            extensions,
            has_next,
            incremental,
        })
    }

    /// Returns true if one of the errors says the server does not know the persisted query.
    pub(crate) fn is_persisted_query_not_found(&self) -> bool {
        self.errors.iter().any(|error| {
            error.message == "PersistedQueryNotFound"
                || error.message == "PersistedQueryNotSupported"
                || matches!(
                    error.extension_code().as_deref(),
                    Some("PERSISTED_QUERY_NOT_FOUND") | Some("PERSISTED_QUERY_NOT_SUPPORTED")
                )
        })
    }
}

/// A graphql incremental response.
/// Used with `@defer`
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct IncrementalResponse {
    /// The label that was passed to the defer directive for this patch.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub label: Option<String>,

    /// The response data.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub data: Option<Value>,

    /// The path that the data should be merged at.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub path: Option<Path>,

    /// The optional graphql errors encountered.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub errors: Vec<Error>,

    /// The optional graphql extensions.
    #[serde(skip_serializing_if = "Object::is_empty", default)]
    pub extensions: Object,
}

#[buildstructor::buildstructor]
impl IncrementalResponse {
    /// Constructor
    #[builder(visibility = "pub")]
    fn new(
        label: Option<String>,
        data: Option<Value>,
        path: Option<Path>,
        errors: Vec<Error>,
        extensions: Map<ByteString, Value>,
    ) -> Self {
        Self {
            label,
            data,
            path,
            errors,
            extensions,
        }
    }

    fn from_value(value: Value) -> Result<IncrementalResponse, FetchError> {
        let mut object =
            ensure_object!(value).map_err(|reason| FetchError::MalformedResponse { reason })?;
        let malformed = |reason: &str| FetchError::MalformedResponse {
            reason: reason.to_string(),
        };

        let data = extract_key_value_from_object!(object, "data");
        let label = extract_key_value_from_object!(object, "label", Value::String(s) => s)
            .map_err(malformed)?
            .map(|s| s.as_str().to_string());
        let path = extract_key_value_from_object!(object, "path")
            .map(serde_json_bytes::from_value)
            .transpose()
            .map_err(|err| FetchError::MalformedResponse {
                reason: err.to_string(),
            })?;
        let errors = extract_key_value_from_object!(object, "errors", Value::Array(v) => v)
            .map_err(malformed)?
            .into_iter()
            .flatten()
            .map(|v| {
                Error::from_value(v).map_err(|reason| FetchError::MalformedResponse { reason })
            })
            .collect::<Result<Vec<Error>, FetchError>>()?;
        let extensions =
            extract_key_value_from_object!(object, "extensions", Value::Object(o) => o)
                .map_err(malformed)?
                .unwrap_or_default();

        Ok(IncrementalResponse {
            label,
            data,
            path,
            errors,
            extensions,
        })
    }
}
