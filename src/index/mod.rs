pub mod bloom;
pub mod inverted;
pub mod posting;
pub mod prefix;
pub mod vectors;

pub use inverted::{DocumentSummary, ShardIndex, ShardMetadata};
pub use posting::{TermEntry, TermPosting};
