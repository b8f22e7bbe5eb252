pub mod token;
pub mod tokenizer;
pub mod filter;
pub mod filters;
pub mod analyzer;

pub use analyzer::{extract_terms, find_term_positions, Analyzer, AnalyzerRegistry};
