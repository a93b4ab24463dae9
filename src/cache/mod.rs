//! Two-tier result caching: shared namespace regions and the per-session
//! transactional buffers placed in front of them.

pub mod key;
pub mod region;
pub mod store;
pub mod transactional;

pub use key::CacheKey;
pub use region::CacheRegion;
pub use store::{Cache, LruCache, PerpetualCache};
pub use transactional::{TransactionalCache, TransactionalCacheManager};
