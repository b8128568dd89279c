pub mod layered;
pub mod moka;
pub mod null;
pub mod redis;

pub use layered::LayeredCache;
pub use self::moka::{MokaCacheConfig, MokaLinkCache};
pub use null::NullCache;
pub use self::redis::RedisLinkCache;
pub use shortify_core::{CacheError, LinkCache};
