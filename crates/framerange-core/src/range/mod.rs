pub mod cache;
pub mod engine;
pub mod normalize;

pub use cache::{CacheStats, FrameLookupCache, DEFAULT_LOOKUP_CACHE_CAPACITY};
pub use engine::VideoAnnotationRange;
pub use normalize::{is_normalized, normalize};
