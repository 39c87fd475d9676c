pub mod backend;
pub mod batch;
pub mod clock;
pub mod dedup;
pub mod error;
pub mod memory_store;
pub mod redis_store;
pub mod store;
pub mod types;

pub use backend::{PipelinedSet, StoreBackend};
pub use batch::BatchPipeline;
pub use clock::{Clock, ManualClock, SystemClock};
pub use dedup::{DedupStats, RequestDeduplicator};
pub use error::{FetchError, StoreError, StoreResult};
pub use memory_store::MemoryStore;
pub use redis_store::RedisStore;
pub use store::{CacheStore, TTL_UNKNOWN};
pub use types::{CacheEntry, StoreStats, StoredValue};
