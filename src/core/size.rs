use serde::Serialize;
use serde_json::Value;

/// Byte-size estimate for structured values.
///
/// Used for shard-size planning and cache budgets. Estimates only need to be
/// proportional to real cost, not exact.
pub trait SizeEstimator: Send + Sync {
    fn estimate(&self, value: &Value) -> usize;

    fn name(&self) -> &str;
}

/// Estimate any serializable record. Falls back to zero when the record
/// cannot be represented as JSON.
pub fn estimate_record<T: Serialize>(estimator: &dyn SizeEstimator, record: &T) -> usize {
    serde_json::to_value(record)
        .map(|value| estimator.estimate(&value))
        .unwrap_or(0)
}

/// Exact length of the compact JSON encoding.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSizeEstimator;

impl SizeEstimator for JsonSizeEstimator {
    fn estimate(&self, value: &Value) -> usize {
        serde_json::to_vec(value).map(|bytes| bytes.len()).unwrap_or(0)
    }

    fn name(&self) -> &str {
        "json"
    }
}

/// Walks the value tree and charges a fixed overhead per node instead of
/// serializing it.
#[derive(Debug, Clone, Copy)]
pub struct StructuralSizeEstimator {
    pub node_overhead: usize,
}

impl Default for StructuralSizeEstimator {
    fn default() -> Self {
        StructuralSizeEstimator { node_overhead: 2 }
    }
}

impl SizeEstimator for StructuralSizeEstimator {
    fn estimate(&self, value: &Value) -> usize {
        let children = match value {
            Value::Null => 4,
            Value::Bool(_) => 5,
            Value::Number(_) => 8,
            Value::String(s) => s.len(),
            Value::Array(items) => items.iter().map(|item| self.estimate(item)).sum(),
            Value::Object(map) => map
                .iter()
                .map(|(key, item)| key.len() + self.estimate(item))
                .sum(),
        };
        children + self.node_overhead
    }

    fn name(&self) -> &str {
        "structural"
    }
}
