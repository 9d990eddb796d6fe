//! Size-bounded result cache and background cache population.

pub mod cache;
pub mod populator;

pub use cache::{Cache, MokaResultCache, NamedKey};
pub use populator::{decode_cached, BackgroundCachePopulator, CacheStrategy};
