pub mod cache;
pub mod patterns;
pub mod processor;
pub mod types;

pub use processor::QueryProcessor;
pub use types::{
    ProcessedQuery, QueryBoosts, QueryComplexity, QueryFilters, QueryIntent, QueryPhrase, SearchOptions,
};
