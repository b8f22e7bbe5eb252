use std::time::Duration;
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use serde_json::Value;
use crate::core::size::{estimate_record, SizeEstimator};

/// A cached value with its creation time and absolute expiry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub value: Value,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,

    /// Estimated size, used for memory budgets
    pub size_bytes: usize,
}

impl CacheEntry {
    pub fn new(key: impl Into<String>, value: Value, ttl: Duration, estimator: &dyn SizeEstimator) -> Self {
        let key = key.into();
        let created_at = Utc::now();
        let size_bytes = key.len() + estimate_record(estimator, &value);
        CacheEntry {
            key,
            value,
            created_at,
            expires_at: expiry(created_at, ttl),
            size_bytes,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Copy of this entry that expires no later than `tier_ttl` after
    /// `stored_at`, the moment it enters the tier. The original expiry is
    /// kept when it comes sooner.
    pub fn capped(&self, tier_ttl: Duration, stored_at: DateTime<Utc>) -> CacheEntry {
        let mut entry = self.clone();
        let ceiling = expiry(stored_at, tier_ttl);
        if ceiling < entry.expires_at {
            entry.expires_at = ceiling;
        }
        entry
    }

    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).to_std().unwrap_or(Duration::ZERO)
    }
}

fn expiry(from: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| from.checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
