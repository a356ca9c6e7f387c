pub mod cache;
pub mod record;

pub use cache::{absolute_path, CacheError, CacheStats, LoadStatus, ProcessingCache};
pub use record::CacheRecord;
