use std::collections::HashSet;

use crate::cache::CacheKey;
use crate::graphql;
use crate::json_ext::Object;

/// Where a [`GraphQLResult`] comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultSource {
    Cache,
    Server,
}

/// The result of an operation: typed data plus whatever the response carried next to it.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphQLResult<T> {
    pub data: Option<T>,
    /// Field errors returned by the server. They are data, not failures.
    pub errors: Vec<graphql::Error>,
    pub extensions: Object,
    pub source: ResultSource,
    /// The cache keys the data was read from, when it was read through the cache.
    pub dependent_keys: Option<HashSet<CacheKey>>,
}

impl<T> GraphQLResult<T> {
    pub(crate) fn from_cache(data: T, dependent_keys: HashSet<CacheKey>) -> Self {
        Self {
            data: Some(data),
            errors: Vec::new(),
            extensions: Object::new(),
            source: ResultSource::Cache,
            dependent_keys: Some(dependent_keys),
        }
    }

    pub(crate) fn from_server(
        data: Option<T>,
        errors: Vec<graphql::Error>,
        extensions: Object,
    ) -> Self {
        Self {
            data,
            errors,
            extensions,
            source: ResultSource::Server,
            dependent_keys: None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> GraphQLResult<U> {
        GraphQLResult {
            data: self.data.map(f),
            errors: self.errors,
            extensions: self.extensions,
            source: self.source,
            dependent_keys: self.dependent_keys,
        }
    }
}
