//! Key/value cache used for workflow state snapshots.
//!
//! Values are stored as raw bytes behind the [`AppCache`] trait. The
//! [`CacheManager`] picks the backend from configuration: an in-process
//! memory cache when enabled, a no-op cache otherwise.
//!
//! ```toml
//! [cache]
//! enabled = true
//!
//! [cache.memory]
//! max_size = 10000
//! ttl_seconds = 3600
//! ```

mod error;
mod manager;
mod memory;
mod noop;
mod traits;

pub use error::CacheError;
pub use manager::CacheManager;
pub use memory::MemoryCache;
pub use noop::NoOpCache;
pub use traits::AppCache;

pub use crate::config::settings::{CacheConfig, MemoryCacheConfig};
