use std::collections::HashMap;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::json_ext::Object;

/// The identity of an object, as returned by a [`CacheKeyResolver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKeyInfo {
    pub id: String,
    /// Types sharing an id space (e.g. every implementation of an interface) can use the same
    /// group so their objects collide on purpose.
    pub unique_key_group: Option<String>,
}

impl CacheKeyInfo {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            unique_key_group: None,
        }
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.unique_key_group = Some(group.into());
        self
    }
}

/// Computes the identity of an object from its typename and its resolved fields.
pub type CacheKeyResolver = Arc<dyn Fn(&str, &Object) -> Option<CacheKeyInfo> + Send + Sync>;

/// The schema metadata needed at execution time.
///
/// This is not a full GraphQL schema: only the possible types of abstract types are known, plus
/// the function that gives objects their identity.
#[derive(Clone, Default)]
pub struct Schema {
    possible_types: HashMap<String, HashSet<String>>,
    cache_key_resolver: Option<CacheKeyResolver>,
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("possible_types", &self.possible_types)
            .field("cache_key_resolver", &self.cache_key_resolver.is_some())
            .finish()
    }
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares `possible_types` as the concrete types of the interface or union
    /// `abstract_type`.
    pub fn with_possible_types<I, S>(
        mut self,
        abstract_type: impl Into<String>,
        possible_types: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.possible_types
            .entry(abstract_type.into())
            .or_default()
            .extend(possible_types.into_iter().map(Into::into));
        self
    }

    pub fn with_cache_key_resolver<F>(mut self, resolver: F) -> Self
    where
        F: Fn(&str, &Object) -> Option<CacheKeyInfo> + Send + Sync + 'static,
    {
        self.cache_key_resolver = Some(Arc::new(resolver));
        self
    }

    pub(crate) fn is_subtype(&self, abstract_type: &str, maybe_subtype: &str) -> bool {
        self.possible_types
            .get(abstract_type)
            .map(|types| types.contains(maybe_subtype))
            .unwrap_or(false)
    }

    /// Whether an object of type `typename` can be viewed as `type_condition`.
    pub(crate) fn matches_type_condition(&self, type_condition: &str, typename: &str) -> bool {
        type_condition == typename || self.is_subtype(type_condition, typename)
    }

    /// The cache key of an object, if the resolver gives it an identity.
    ///
    /// The key is `<group or typename>:<id>`. An empty id means no identity.
    pub fn cache_key(&self, typename: &str, object: &Object) -> Option<String> {
        let resolver = self.cache_key_resolver.as_ref()?;
        let info = resolver(typename, object)?;
        if info.id.is_empty() {
            return None;
        }
        let prefix = info.unique_key_group.as_deref().unwrap_or(typename);
        Some(format!("{prefix}:{}", info.id))
    }
}
