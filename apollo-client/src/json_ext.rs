//! Performance oriented JSON manipulation.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde_json_bytes::ByteString;
use serde_json_bytes::Map;
pub use serde_json_bytes::Value;

/// A JSON object.
pub type Object = Map<ByteString, Value>;

/// Extract an object from a [`Value`], or fail with a descriptive message.
macro_rules! ensure_object {
    ($value:expr) => {{
        match $value {
            $crate::json_ext::Value::Object(o) => Ok(o),
            _ => Err(String::from("expected a JSON object")),
        }
    }};
}

/// Remove `$key` from `$object` and match it against `$pattern`.
///
/// Absent and `null` values are both `None`.
macro_rules! extract_key_value_from_object {
    ($object:expr, $key:literal, $pattern:pat => $var:ident) => {{
        match $object.remove($key) {
            Some($pattern) => Ok(Some($var)),
            None | Some($crate::json_ext::Value::Null) => Ok(None),
            _ => Err(concat!("invalid type for key: ", $key)),
        }
    }};
    ($object:expr, $key:literal) => {{
        match $object.remove($key) {
            None | Some($crate::json_ext::Value::Null) => None,
            Some(value) => Some(value),
        }
    }};
}

/// An element of a response [`Path`].
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathElement {
    /// An index in a list.
    Index(usize),

    /// A response key in an object.
    Key(String),
}

/// A path into a GraphQL response, as found in errors and incremental payloads.
///
/// e.g `hero/friends/0/name`
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Path(pub Vec<PathElement>);

impl Path {
    pub fn empty() -> Path {
        Path(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PathElement> {
        self.0.iter()
    }

    pub fn last(&self) -> Option<&PathElement> {
        self.0.last()
    }

    pub fn push(&mut self, element: PathElement) {
        self.0.push(element)
    }

    pub fn pop(&mut self) -> Option<PathElement> {
        self.0.pop()
    }

    /// Returns a new path with `element` appended.
    pub fn join(&self, element: impl Into<PathElement>) -> Path {
        let mut elements = self.0.clone();
        elements.push(element.into());
        Path(elements)
    }
}

impl From<&str> for PathElement {
    fn from(key: &str) -> Self {
        PathElement::Key(key.to_string())
    }
}

impl From<String> for PathElement {
    fn from(key: String) -> Self {
        PathElement::Key(key)
    }
}

impl From<usize> for PathElement {
    fn from(index: usize) -> Self {
        PathElement::Index(index)
    }
}

impl<T> From<Vec<T>> for Path
where
    T: Into<PathElement>,
{
    fn from(elements: Vec<T>) -> Self {
        Path(elements.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for PathElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathElement::Index(index) => write!(f, "{index}"),
            PathElement::Key(key) => write!(f, "{key}"),
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, element) in self.0.iter().enumerate() {
            if index > 0 {
                write!(f, "/")?;
            }
            write!(f, "{element}")?;
        }
        Ok(())
    }
}

/// Extension trait for [`serde_json_bytes::Value`].
pub trait ValueExt {
    /// Deep merge `other` into `self`.
    ///
    /// Objects are merged key by key, lists element by element, anything else is replaced.
    fn deep_merge(&mut self, other: Self);

    /// Returns the value found at `path`, if every element of the path exists.
    fn get_path_mut(&mut self, path: &Path) -> Option<&mut Value>;

    /// Deep merge `other` at `path`. Returns `false` if the path does not exist.
    fn merge_at_path(&mut self, path: &Path, other: Value) -> bool;
}

impl ValueExt for Value {
    fn deep_merge(&mut self, other: Self) {
        match (self, other) {
            (Value::Object(a), Value::Object(b)) => {
                for (key, value) in b.into_iter() {
                    match a.get_mut(key.as_str()) {
                        Some(existing) => existing.deep_merge(value),
                        None => {
                            a.insert(key, value);
                        }
                    }
                }
            }
            (Value::Array(a), Value::Array(b)) => {
                for (index, value) in b.into_iter().enumerate() {
                    match a.get_mut(index) {
                        Some(existing) => existing.deep_merge(value),
                        None => a.push(value),
                    }
                }
            }
            (a, b) => {
                *a = b;
            }
        }
    }

    fn get_path_mut(&mut self, path: &Path) -> Option<&mut Value> {
        let mut current = self;
        for element in path.iter() {
            current = match element {
                PathElement::Key(key) => current.as_object_mut()?.get_mut(key.as_str())?,
                PathElement::Index(index) => current.as_array_mut()?.get_mut(*index)?,
            };
        }
        Some(current)
    }

    fn merge_at_path(&mut self, path: &Path, other: Value) -> bool {
        match self.get_path_mut(path) {
            Some(target) => {
                target.deep_merge(other);
                true
            }
            None => false,
        }
    }
}
