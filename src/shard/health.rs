use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use crate::core::config::ShardConfig;
use crate::core::stats::{HealthCheck, HealthStatus};
use crate::index::ShardIndex;

const OVERSIZED_PENALTY: u8 = 30;
const STALE_PENALTY: u8 = 20;
const INTEGRITY_PENALTY: u8 = 60;
const EMPTY_PENALTY: u8 = 10;

/// Advisory health of one shard. Recomputed periodically, never stored in
/// the index itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShardHealth {
    pub status: HealthStatus,
    pub score: u8,
    pub issues: Vec<String>,
    pub checks: Vec<HealthCheck>,
    pub last_accessed: DateTime<Utc>,
    pub access_count: u64,
    pub checked_at: DateTime<Utc>,
}

/// Scores a shard out of 100 from size, staleness, integrity and emptiness.
#[derive(Debug, Clone)]
pub struct HealthEvaluator {
    pub max_healthy_bytes: usize,
    pub stale_after: chrono::Duration,
    pub degraded_below: u8,
    pub unhealthy_below: u8,
}

impl HealthEvaluator {
    pub fn new(config: &ShardConfig) -> Self {
        HealthEvaluator {
            max_healthy_bytes: config.max_healthy_bytes,
            stale_after: chrono::Duration::seconds(config.stale_after_secs as i64),
            degraded_below: config.degraded_below,
            unhealthy_below: config.unhealthy_below,
        }
    }

    pub fn status_for(&self, score: u8) -> HealthStatus {
        if score < self.unhealthy_below {
            HealthStatus::Unhealthy
        } else if score < self.degraded_below {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }

    pub fn evaluate(
        &self,
        shard: &ShardIndex,
        estimated_bytes: usize,
        last_accessed: DateTime<Utc>,
        access_count: u64,
        now: DateTime<Utc>,
    ) -> ShardHealth {
        let idle = now.signed_duration_since(last_accessed);
        let integrity = shard.integrity_issues();

        let checks = vec![
            check(
                "size",
                estimated_bytes <= self.max_healthy_bytes,
                OVERSIZED_PENALTY,
                format!("{} bytes exceeds the {} byte ceiling", estimated_bytes, self.max_healthy_bytes),
            ),
            check(
                "staleness",
                idle <= self.stale_after,
                STALE_PENALTY,
                format!("not accessed for {}h", idle.num_hours()),
            ),
            check(
                "integrity",
                integrity.is_empty(),
                INTEGRITY_PENALTY,
                integrity.join("; "),
            ),
            check(
                "documents",
                shard.document_count() > 0,
                EMPTY_PENALTY,
                "shard holds no documents".to_string(),
            ),
        ];

        let penalty: u32 = checks.iter().map(|c| c.penalty as u32).sum();
        let score = 100u32.saturating_sub(penalty) as u8;

        ShardHealth {
            status: self.status_for(score),
            score,
            issues: checks.iter().filter_map(|c| c.message.clone()).collect(),
            checks,
            last_accessed,
            access_count,
            checked_at: now,
        }
    }
}

fn check(name: &str, passed: bool, penalty: u8, message: String) -> HealthCheck {
    HealthCheck {
        name: name.to_string(),
        passed,
        penalty: if passed { 0 } else { penalty },
        message: if passed { None } else { Some(message) },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::Analyzer;
    use crate::core::size::JsonSizeEstimator;
    use crate::core::types::{DocId, Document, DocumentType, ShardId};

    fn shard() -> ShardIndex {
        let mut shard = ShardIndex::new(ShardId::numbered(0));
        let doc = Document::new(DocId::from("book-ruth"), DocumentType::Book, "Ruth", "Naomi and Boaz");
        shard.add_document(&doc, &Analyzer::standard()).unwrap();
        shard.finalize(&JsonSizeEstimator).unwrap();
        shard
    }

    fn evaluator() -> HealthEvaluator {
        HealthEvaluator::new(&ShardConfig::default())
    }

    #[test]
    fn test_fresh_shard_is_healthy() {
        let now = Utc::now();
        let health = evaluator().evaluate(&shard(), 1024, now, 0, now);
        assert_eq!(health.score, 100);
        assert_eq!(health.status, HealthStatus::Healthy);
        assert!(health.issues.is_empty());
    }

    #[test]
    fn test_stale_and_oversized_shard_degrades() {
        let now = Utc::now();
        let last = now - chrono::Duration::hours(30);
        let health = evaluator().evaluate(&shard(), 60 * 1024 * 1024, last, 3, now);
        assert_eq!(health.score, 50);
        assert_eq!(health.status, HealthStatus::Degraded);
        assert_eq!(health.issues.len(), 2);
    }

    #[test]
    fn test_corrupt_shard_is_unhealthy() {
        let mut shard = shard();
        shard.metadata.document_count = 9;
        let now = Utc::now();
        let health = evaluator().evaluate(&shard, 1024, now, 0, now);
        assert_eq!(health.score, 40);
        assert_eq!(health.status, HealthStatus::Unhealthy);
        assert!(!health.status.is_servable());
    }

    #[test]
    fn test_status_thresholds() {
        let evaluator = evaluator();
        assert_eq!(evaluator.status_for(80), HealthStatus::Healthy);
        assert_eq!(evaluator.status_for(79), HealthStatus::Degraded);
        assert_eq!(evaluator.status_for(50), HealthStatus::Degraded);
        assert_eq!(evaluator.status_for(49), HealthStatus::Unhealthy);
    }
}
