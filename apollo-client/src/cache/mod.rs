//! The normalized cache.
//!
//! Responses are split into flat [`Record`]s, one per object, where nested objects are replaced
//! with [`CacheReference`]s. Records live in a [`NormalizedCache`] backend, which is only ever
//! accessed through the transactions of the [`ApolloStore`] that owns it.

mod key;
mod loader;
mod normalized;
mod policy;
mod record;
mod store;
mod watcher;

pub use key::field_storage_key;
pub(crate) use loader::DataLoader;
pub use normalized::InMemoryNormalizedCache;
pub use normalized::NormalizedCache;
pub use policy::CachePolicy;
pub use record::CacheKey;
pub use record::CacheReference;
pub use record::Record;
pub use record::RecordSet;
pub use record::RecordValue;
pub use record::MUTATION_ROOT;
pub use record::QUERY_ROOT;
pub use record::SUBSCRIPTION_ROOT;
pub(crate) use store::normalize;
pub use store::ApolloStore;
pub use store::ApolloStoreSubscriber;
pub use store::ReadTransaction;
pub use store::ReadWriteTransaction;
pub use store::SubscriptionToken;
pub(crate) use watcher::Fetch;
pub use watcher::QueryWatcher;
pub use watcher::ResultStream;
