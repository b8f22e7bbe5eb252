pub mod client;
pub mod executor;
pub mod results;
pub mod snippet;

pub use client::{ClientStats, SearchClient, Suggestion};
pub use executor::{ScoringExecutor, ShardExecutor};
pub use results::{merge_results, rank_order, SearchHit, SearchResponse, TopKCollector};
pub use snippet::SnippetGenerator;
