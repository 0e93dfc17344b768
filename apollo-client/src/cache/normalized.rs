use std::collections::HashMap;
use std::collections::HashSet;

use async_trait::async_trait;

use super::CacheKey;
use super::Record;
use super::RecordSet;
use crate::error::CacheError;

/// A storage backend for records.
///
/// Backends hold no locks: they must only be accessed through the transactions of the
/// [`ApolloStore`](super::ApolloStore) that owns them.
#[async_trait]
pub trait NormalizedCache: Send + Sync + 'static {
    /// Loads the records for `keys`. Keys without a record are absent from the result.
    async fn load_records(
        &self,
        keys: &HashSet<CacheKey>,
    ) -> Result<HashMap<CacheKey, Record>, CacheError>;

    /// Merges `records` into the cache and returns the keys of the fields whose value changed,
    /// including every field of records that did not exist yet.
    async fn merge(&mut self, records: RecordSet) -> Result<HashSet<CacheKey>, CacheError>;

    async fn remove_record(&mut self, key: &str) -> Result<(), CacheError>;

    /// Removes every record whose key contains `pattern`, ignoring case.
    ///
    /// References to removed records are left in place and surface as cache misses when read.
    async fn remove_records(&mut self, pattern: &str) -> Result<(), CacheError>;

    async fn clear(&mut self) -> Result<(), CacheError>;
}

/// A [`NormalizedCache`] keeping its records in memory.
#[derive(Debug, Default, Clone)]
pub struct InMemoryNormalizedCache {
    records: HashMap<CacheKey, Record>,
}

impl InMemoryNormalizedCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: RecordSet) -> Self {
        Self {
            records: records
                .into_iter()
                .map(|record| (record.key.clone(), record))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl NormalizedCache for InMemoryNormalizedCache {
    async fn load_records(
        &self,
        keys: &HashSet<CacheKey>,
    ) -> Result<HashMap<CacheKey, Record>, CacheError> {
        Ok(keys
            .iter()
            .filter_map(|key| {
                self.records
                    .get(key)
                    .map(|record| (key.clone(), record.clone()))
            })
            .collect())
    }

    async fn merge(&mut self, records: RecordSet) -> Result<HashSet<CacheKey>, CacheError> {
        let mut changed_keys = HashSet::new();
        for record in records {
            match self.records.get_mut(&record.key) {
                Some(existing) => changed_keys.extend(existing.merge(record)),
                None => {
                    changed_keys.extend(record.field_keys());
                    self.records.insert(record.key.clone(), record);
                }
            }
        }
        Ok(changed_keys)
    }

    async fn remove_record(&mut self, key: &str) -> Result<(), CacheError> {
        self.records.remove(key);
        Ok(())
    }

    async fn remove_records(&mut self, pattern: &str) -> Result<(), CacheError> {
        let pattern = pattern.to_lowercase();
        self.records
            .retain(|key, _| !key.to_lowercase().contains(&pattern));
        Ok(())
    }

    async fn clear(&mut self) -> Result<(), CacheError> {
        self.records.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json_bytes::json;

    use super::*;
    use crate::cache::CacheReference;
    use crate::cache::RecordValue;
    use crate::cache::QUERY_ROOT;

    fn records() -> RecordSet {
        RecordSet::from_iter([
            Record::new(QUERY_ROOT).with_field("hero", CacheReference::new("2001")),
            Record::new("2001")
                .with_field("name", json!("R2-D2"))
                .with_field("__typename", json!("Droid")),
        ])
    }

    #[tokio::test]
    async fn merge_is_idempotent() {
        let mut cache = InMemoryNormalizedCache::new();

        let changed = cache.merge(records()).await.unwrap();
        assert_eq!(
            changed,
            HashSet::from([
                "QUERY_ROOT.hero".to_string(),
                "2001.name".to_string(),
                "2001.__typename".to_string(),
            ])
        );

        let changed = cache.merge(records()).await.unwrap();
        assert!(changed.is_empty());
    }

    #[tokio::test]
    async fn load_skips_missing_keys() {
        let cache = InMemoryNormalizedCache::with_records(records());
        let loaded = cache
            .load_records(&HashSet::from(["2001".to_string(), "1000".to_string()]))
            .await
            .unwrap();

        assert_eq!(loaded.len(), 1);
        assert_eq!(
            loaded.get("2001").and_then(|record| record.get("name")),
            Some(&RecordValue::Scalar(json!("R2-D2")))
        );
    }

    #[tokio::test]
    async fn remove_records_matching_pattern_ignores_case() {
        let mut cache = InMemoryNormalizedCache::with_records(RecordSet::from_iter([
            Record::new("Human:1000").with_field("name", json!("Luke")),
            Record::new("human:1002").with_field("name", json!("Han")),
            Record::new("Droid:2001").with_field("name", json!("R2-D2")),
        ]));

        cache.remove_records("HUMAN").await.unwrap();
        assert_eq!(cache.len(), 1);

        cache.remove_record("Droid:2001").await.unwrap();
        assert!(cache.is_empty());
    }
}
