use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Serialize, Deserialize};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use crate::core::config::ShardConfig;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::stats::HealthStatus;
use crate::core::types::ShardId;
use crate::index::{ShardIndex, ShardMetadata};
use crate::query::types::{ProcessedQuery, SearchOptions};
use crate::shard::balancer::{ShardBalancer, ShardLoad};
use crate::shard::health::{HealthEvaluator, ShardHealth};

/// A registered shard with its access counters and latest health.
pub struct ShardEntry {
    pub index: Arc<ShardIndex>,
    pub metadata: ShardMetadata,
    access_count: AtomicU64,
    recent_accesses: AtomicU64,
    last_accessed: RwLock<DateTime<Utc>>,
    health: RwLock<ShardHealth>,
}

impl ShardEntry {
    pub fn health(&self) -> ShardHealth {
        self.health.read().clone()
    }

    pub fn access_count(&self) -> u64 {
        self.access_count.load(Ordering::Relaxed)
    }

    fn load(&self, id: &ShardId) -> ShardLoad {
        ShardLoad {
            id: id.clone(),
            recent_accesses: self.recent_accesses.load(Ordering::Relaxed),
            total_accesses: self.access_count(),
            size_bytes: self.metadata.estimated_bytes,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadReport {
    pub loads: Vec<ShardLoad>,
    /// Busiest shard's recent accesses over the mean; 1.0 when even
    pub imbalance_ratio: f64,
    pub generated_at: DateTime<Utc>,
}

/// Owns the registered shards and picks fan-out targets for each query.
///
/// Read-mostly: registration takes the write lock, everything else reads.
pub struct ShardManager {
    config: ShardConfig,
    shards: RwLock<BTreeMap<ShardId, Arc<ShardEntry>>>,
    balancer: ShardBalancer,
    evaluator: HealthEvaluator,
}

impl ShardManager {
    pub fn new(config: ShardConfig) -> Self {
        ShardManager {
            evaluator: HealthEvaluator::new(&config),
            config,
            shards: RwLock::new(BTreeMap::new()),
            balancer: ShardBalancer::new(),
        }
    }

    pub fn register_shard(&self, id: ShardId, data: Arc<ShardIndex>, metadata: ShardMetadata) -> Result<()> {
        if data.id != id {
            return Err(Error::new(
                ErrorKind::InvalidArgument,
                format!("shard data {} registered as {}", data.id, id),
            ));
        }

        let now = Utc::now();
        let health = self.evaluator.evaluate(&data, metadata.estimated_bytes, now, 0, now);
        if !health.status.is_healthy() {
            warn!(shard = %id, score = health.score, issues = ?health.issues, "Registered shard is not healthy");
        }

        let entry = Arc::new(ShardEntry {
            index: data,
            metadata,
            access_count: AtomicU64::new(0),
            recent_accesses: AtomicU64::new(0),
            last_accessed: RwLock::new(now),
            health: RwLock::new(health),
        });

        if self.shards.write().insert(id.clone(), entry).is_some() {
            info!(shard = %id, "Shard replaced");
        } else {
            debug!(shard = %id, "Shard registered");
        }
        Ok(())
    }

    /// Register a built shard under its own id and metadata.
    pub fn register_index(&self, data: Arc<ShardIndex>) -> Result<()> {
        let metadata = data.metadata.clone();
        self.register_shard(data.id.clone(), data, metadata)
    }

    /// Fetch a shard for searching; counts as an access.
    pub fn get_shard(&self, id: &ShardId) -> Option<Arc<ShardIndex>> {
        let entry = self.shards.read().get(id).cloned()?;
        entry.access_count.fetch_add(1, Ordering::Relaxed);
        entry.recent_accesses.fetch_add(1, Ordering::Relaxed);
        *entry.last_accessed.write() = Utc::now();
        Some(entry.index.clone())
    }

    pub fn shard_ids(&self) -> Vec<ShardId> {
        self.shards.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.shards.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.read().is_empty()
    }

    /// Shards whose last health check allows serving queries.
    pub fn servable_count(&self) -> usize {
        self.shards.read()
            .values()
            .filter(|entry| entry.health.read().status.is_servable())
            .count()
    }

    pub fn shard_health(&self, id: &ShardId) -> Option<ShardHealth> {
        self.shards.read().get(id).map(|entry| entry.health())
    }

    /// Shard ids to fan the query out to, in balancer order.
    ///
    /// Unhealthy shards are excluded, as are shards holding none of the
    /// filtered content types and shards whose bloom filter rules out every
    /// query term.
    pub fn select_optimal_shards(&self, query: &ProcessedQuery, options: &SearchOptions) -> Vec<ShardId> {
        let lookup_terms = query.lookup_terms();
        let shards = self.shards.read();

        let candidates: Vec<ShardLoad> = shards.iter()
            .filter(|(id, entry)| {
                let health = entry.health.read();
                if !health.status.is_servable() {
                    debug!(shard = %id, score = health.score, "Skipping unhealthy shard");
                    return false;
                }
                true
            })
            .filter(|(_, entry)| {
                let wanted = &query.filters.content_types;
                wanted.is_empty() || wanted.iter().any(|t| entry.index.holds_type(*t))
            })
            .filter(|(id, entry)| {
                if !self.config.use_bloom_filter || lookup_terms.is_empty() {
                    return true;
                }
                let possible = entry.index.might_contain_any(&lookup_terms);
                if !possible {
                    debug!(shard = %id, "Bloom filter rules out every query term");
                }
                possible
            })
            .map(|(id, entry)| entry.load(id))
            .collect();

        let strategy = options.strategy.unwrap_or(self.config.strategy);
        self.balancer.order(&candidates, strategy)
    }

    /// Recompute every shard's health and log status transitions.
    pub fn monitor_shard_health(&self) -> Vec<(ShardId, ShardHealth)> {
        let now = Utc::now();
        let shards = self.shards.read();
        let mut report = Vec::with_capacity(shards.len());

        for (id, entry) in shards.iter() {
            let last_accessed = *entry.last_accessed.read();
            let health = self.evaluator.evaluate(
                &entry.index,
                entry.metadata.estimated_bytes,
                last_accessed,
                entry.access_count(),
                now,
            );

            let previous = entry.health.read().status;
            if previous != health.status {
                match health.status {
                    HealthStatus::Healthy => info!(shard = %id, score = health.score, "Shard recovered"),
                    _ => warn!(shard = %id, score = health.score, status = ?health.status, issues = ?health.issues, "Shard health changed"),
                }
            }

            *entry.health.write() = health.clone();
            report.push((id.clone(), health));
        }

        report
    }

    /// Report per-shard load, then halve the recent-access window so the
    /// least-loaded strategy tracks recent traffic.
    pub fn balance_load(&self) -> LoadReport {
        let shards = self.shards.read();
        let loads: Vec<ShardLoad> = shards.iter().map(|(id, entry)| entry.load(id)).collect();

        let total: u64 = loads.iter().map(|l| l.recent_accesses).sum();
        let max = loads.iter().map(|l| l.recent_accesses).max().unwrap_or(0);
        let imbalance_ratio = if total == 0 {
            1.0
        } else {
            max as f64 / (total as f64 / loads.len() as f64)
        };

        for entry in shards.values() {
            let recent = entry.recent_accesses.load(Ordering::Relaxed);
            entry.recent_accesses.store(recent / 2, Ordering::Relaxed);
        }

        debug!(shards = loads.len(), imbalance_ratio, "Load balanced");
        LoadReport {
            loads,
            imbalance_ratio,
            generated_at: Utc::now(),
        }
    }

    /// Periodic health monitoring and load decay until the handle is aborted.
    pub fn spawn_health_monitor(self: &Arc<Self>) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        let period = Duration::from_secs(self.config.health_interval_secs.max(1));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // The first tick completes immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                manager.monitor_shard_health();
                manager.balance_load();
            }
        })
    }
}
