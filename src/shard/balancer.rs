use std::sync::atomic::{AtomicUsize, Ordering};
use rand::seq::SliceRandom;
use serde::{Serialize, Deserialize};
use crate::core::config::LoadBalanceStrategy;
use crate::core::types::ShardId;

const BYTES_PER_LOAD_UNIT: f64 = 1024.0 * 1024.0;

/// Load figures for one candidate shard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShardLoad {
    pub id: ShardId,
    pub recent_accesses: u64,
    pub total_accesses: u64,
    pub size_bytes: usize,
}

impl ShardLoad {
    /// Recent access rate plus size, one unit per MB.
    pub fn load_score(&self) -> f64 {
        self.recent_accesses as f64 + self.size_bytes as f64 / BYTES_PER_LOAD_UNIT
    }
}

/// Orders fan-out candidates according to a load-balancing strategy.
#[derive(Debug, Default)]
pub struct ShardBalancer {
    current: AtomicUsize,
}

impl ShardBalancer {
    pub fn new() -> Self {
        ShardBalancer {
            current: AtomicUsize::new(0),
        }
    }

    pub fn order(&self, candidates: &[ShardLoad], strategy: LoadBalanceStrategy) -> Vec<ShardId> {
        if candidates.is_empty() {
            return vec![];
        }

        match strategy {
            // Round-robin: rotate the starting shard on every call
            LoadBalanceStrategy::RoundRobin => {
                let start = self.current.fetch_add(1, Ordering::Relaxed) % candidates.len();
                candidates[start..].iter()
                    .chain(&candidates[..start])
                    .map(|load| load.id.clone())
                    .collect()
            }
            LoadBalanceStrategy::LeastLoaded => {
                let mut sorted: Vec<&ShardLoad> = candidates.iter().collect();
                sorted.sort_by(|a, b| {
                    a.load_score().total_cmp(&b.load_score()).then_with(|| a.id.cmp(&b.id))
                });
                sorted.into_iter().map(|load| load.id.clone()).collect()
            }
            LoadBalanceStrategy::Random => {
                let mut ids: Vec<ShardId> = candidates.iter().map(|load| load.id.clone()).collect();
                ids.shuffle(&mut rand::thread_rng());
                ids
            }
        }
    }
}
