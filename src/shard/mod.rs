pub mod balancer;
pub mod health;
pub mod manager;

pub use balancer::{ShardBalancer, ShardLoad};
pub use health::{HealthEvaluator, ShardHealth};
pub use manager::{LoadReport, ShardEntry, ShardManager};
