pub mod lowercase;
pub mod length;
pub mod stopword;
pub mod stemmer;
pub mod suffix;
