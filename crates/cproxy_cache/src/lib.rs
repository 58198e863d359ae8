//! In-memory HTTP response cache: entries, keys, freshness and policy.

pub mod cache_control;
pub mod entry;
pub mod freshness;
pub mod key;
pub mod policy;
pub mod store;

pub use entry::CacheEntry;
pub use key::CacheKey;
pub use policy::CachePolicy;
pub use store::CacheStore;
