use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;

/// How a query uses the cache.
///
/// Mutations and subscriptions never read from the cache, whatever their policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CachePolicy {
    /// Return the cached result if there is one, fetch otherwise.
    #[default]
    CacheFirst,
    /// Fetch, falling back to the cached result if the fetch fails.
    NetworkFirst,
    /// Always fetch. Results are still written to the cache.
    NetworkOnly,
    /// Return the cached result, fail on a cache miss.
    CacheOnly,
    /// Return the cached result if there is one, then fetch.
    CacheAndNetwork,
    /// Always fetch, never read nor write the cache.
    NoCache,
}

impl CachePolicy {
    /// Whether results may come from the cache.
    pub(crate) fn reads_cache(&self) -> bool {
        !matches!(self, CachePolicy::NetworkOnly | CachePolicy::NoCache)
    }

    pub(crate) fn writes_cache(&self) -> bool {
        !matches!(self, CachePolicy::NoCache)
    }
}
