pub mod artifact;
pub mod auxiliary;
pub mod builder;
pub mod extract;
pub mod partition;
pub mod sources;

pub use artifact::{BuildOutput, BuildStatistics, ConfigEcho, IndexArtifacts, Manifest, ManifestEntry};
pub use auxiliary::{AuxiliaryData, AutocompleteEntry, ContextualRule};
pub use builder::IndexBuilder;
pub use partition::{ContentGroup, ShardPlan, ShardPlanner};
pub use sources::{BookSource, CategorySource, ContentSources, EntitySource};
