use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

use super::CacheKey;
use super::NormalizedCache;
use super::Record;
use crate::error::CacheError;

/// Batches record loads within one transaction.
///
/// Keys are queued with [`DataLoader::enqueue`] while a level of the selection tree is
/// resolved, the first [`DataLoader::load`] then fetches every queued key in one
/// [`NormalizedCache::load_records`] call. Loaded records are kept until [`DataLoader::clear`].
#[derive(Default)]
pub(crate) struct DataLoader {
    pending: Mutex<HashSet<CacheKey>>,
    loaded: Mutex<HashMap<CacheKey, Option<Arc<Record>>>>,
}

impl DataLoader {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn enqueue(&self, key: &str) {
        if !self.loaded.lock().contains_key(key) {
            self.pending.lock().insert(key.to_string());
        }
    }

    /// Returns the record for `key`, `None` if the cache has no such record.
    pub(crate) async fn load(
        &self,
        cache: &dyn NormalizedCache,
        key: &str,
    ) -> Result<Option<Arc<Record>>, CacheError> {
        if let Some(record) = self.loaded.lock().get(key) {
            return Ok(record.clone());
        }

        self.enqueue(key);
        let batch = std::mem::take(&mut *self.pending.lock());
        if !batch.is_empty() {
            tracing::trace!(keys = batch.len(), "loading records");
            let mut records = cache.load_records(&batch).await?;
            let mut loaded = self.loaded.lock();
            for key in batch {
                let record = records.remove(&key).map(Arc::new);
                loaded.insert(key, record);
            }
        }

        Ok(self.loaded.lock().get(key).cloned().flatten())
    }

    /// Forgets every loaded record, subsequent loads see the current content of the cache.
    pub(crate) fn clear(&self) {
        self.pending.lock().clear();
        self.loaded.lock().clear();
    }
}
