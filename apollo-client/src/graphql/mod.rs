//! Types related to GraphQL requests, responses, etc.

mod request;
mod response;

use std::fmt;

pub use request::Request;
pub use response::IncrementalResponse;
pub use response::Response;
use serde::Deserialize;
use serde::Serialize;
use serde_json_bytes::ByteString;
use serde_json_bytes::Map as JsonMap;

use crate::json_ext::Object;
use crate::json_ext::Path;
use crate::json_ext::Value;

/// A GraphQL error as found in the `errors` field of a [`Response`].
///
/// A field error is data: it is returned with the result, it never fails a request. Error
/// locations refer to the server's copy of the document and are not kept.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize, Default)]
#[non_exhaustive]
pub struct Error {
    pub message: String,

    /// If this is a field error, the JSON path to that field in [`Response::data`]
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub path: Option<Path>,

    #[serde(skip_serializing_if = "Object::is_empty", default)]
    pub extensions: Object,
}

#[buildstructor::buildstructor]
impl Error {
    #[builder(visibility = "pub")]
    fn new(message: String, path: Option<Path>, extensions: JsonMap<ByteString, Value>) -> Self {
        Self {
            message,
            path,
            extensions,
        }
    }

    pub(crate) fn from_value(value: Value) -> Result<Error, String> {
        serde_json_bytes::from_value(value).map_err(|err| format!("invalid error: {err}"))
    }

    /// The `code` extension, if the server set one.
    pub fn extension_code(&self) -> Option<String> {
        match self.extensions.get("code")? {
            Value::String(s) => Some(s.as_str().to_owned()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.message.fmt(f)
    }
}
