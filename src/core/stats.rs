use std::sync::atomic::{AtomicU64, Ordering};
use serde::{Serialize, Deserialize};

/// Health check status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }

    pub fn is_servable(&self) -> bool {
        !matches!(self, HealthStatus::Unhealthy)
    }
}

/// Outcome of one named health check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    pub name: String,
    pub passed: bool,
    pub penalty: u8,
    pub message: Option<String>,
}

/// Query counters kept by the search client.
#[derive(Debug, Default)]
pub struct QueryMetrics {
    pub queries: AtomicU64,
    pub cache_hits: AtomicU64,
    pub fallback_queries: AtomicU64,
    pub shard_failures: AtomicU64,
    pub failed_queries: AtomicU64,
    pub total_latency_ms: AtomicU64,
}

impl QueryMetrics {
    pub fn record_query(&self, latency_ms: u64, from_cache: bool) {
        self.queries.fetch_add(1, Ordering::Relaxed);
        self.total_latency_ms.fetch_add(latency_ms, Ordering::Relaxed);
        if from_cache {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> QueryMetricsSnapshot {
        let queries = self.queries.load(Ordering::Relaxed);
        let total_latency = self.total_latency_ms.load(Ordering::Relaxed);
        QueryMetricsSnapshot {
            queries,
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            fallback_queries: self.fallback_queries.load(Ordering::Relaxed),
            shard_failures: self.shard_failures.load(Ordering::Relaxed),
            failed_queries: self.failed_queries.load(Ordering::Relaxed),
            avg_latency_ms: if queries == 0 { 0.0 } else { total_latency as f64 / queries as f64 },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryMetricsSnapshot {
    pub queries: u64,
    pub cache_hits: u64,
    pub fallback_queries: u64,
    pub shard_failures: u64,
    pub failed_queries: u64,
    pub avg_latency_ms: f64,
}

impl QueryMetricsSnapshot {
    pub fn cache_hit_rate(&self) -> f64 {
        if self.queries == 0 {
            0.0
        } else {
            self.cache_hits as f64 / self.queries as f64
        }
    }
}
