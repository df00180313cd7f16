pub mod entry;
pub mod key;
pub mod manager;
pub mod store;

pub use entry::CacheEntry;
pub use key::CacheKey;
pub use manager::CacheManager;
