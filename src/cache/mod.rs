pub mod codec;
pub mod edge;
pub mod entry;
pub mod manager;
pub mod memory;
pub mod persistent;
pub mod tier;

pub use edge::{EdgeStore, EdgeTier, InMemoryEdgeStore};
pub use entry::CacheEntry;
pub use manager::{CacheManager, CacheStats, InvalidationRule};
pub use memory::MemoryTier;
pub use persistent::PersistentTier;
pub use tier::{CacheTier, TierCounters, TierLevel, TierStats};
