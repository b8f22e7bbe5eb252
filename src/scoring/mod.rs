pub mod scorer;

pub use scorer::{field_weight, idf, scorer_for, type_multiplier, Bm25Scorer, DocStats, Scorer, TfIdfScorer};
