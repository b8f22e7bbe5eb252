use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use serde::de::DeserializeOwned;
use tracing::info;
use uuid::Uuid;
use crate::build::auxiliary::AuxiliaryData;
use crate::core::config::{PartitionStrategy, ScoringConfig};
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{DocumentType, ShardId};
use crate::index::ShardIndex;

pub const MANIFEST_FILE: &str = "manifest.json";
pub const AUXILIARY_FILE: &str = "auxiliary.json";
pub const CONFIG_FILE: &str = "config.json";
pub const SHARDS_DIR: &str = "shards";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub id: ShardId,
    /// Relative to the artifact directory
    pub location: String,
    pub estimated_bytes: usize,
    pub document_count: usize,
    pub content_types: BTreeSet<DocumentType>,
    pub groups: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub build_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub strategy: PartitionStrategy,
    pub target_shard_bytes: usize,
    pub total_documents: usize,
    pub shards: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn shard_path(id: &ShardId) -> String {
        format!("{}/{}.json", SHARDS_DIR, id)
    }
}

/// Scoring parameters the index was built for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigEcho {
    pub scoring: ScoringConfig,
    pub strategy: PartitionStrategy,
    pub target_shard_count: usize,
    pub analyzer: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildStatistics {
    pub documents_by_type: BTreeMap<DocumentType, usize>,
    pub total_documents: usize,
    pub total_terms: usize,
    pub shard_count: usize,
    pub mean_shard_bytes: usize,
    pub build_duration_ms: u64,
    pub strategy: Option<PartitionStrategy>,
}

/// Everything one build produces. Data only.
#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub shards: Vec<ShardIndex>,
    pub manifest: Manifest,
    pub auxiliary: AuxiliaryData,
    pub config: ConfigEcho,
    pub statistics: BuildStatistics,
}

impl BuildOutput {
    pub fn shard(&self, id: &ShardId) -> Option<&ShardIndex> {
        self.shards.iter().find(|shard| &shard.id == id)
    }

    /// Write every artifact under `dir`. The manifest goes last, so a
    /// directory without one was never fully published.
    pub fn write_artifacts(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir.join(SHARDS_DIR))?;

        for shard in &self.shards {
            write_json(&dir.join(Manifest::shard_path(&shard.id)), shard, false)?;
        }
        write_json(&dir.join(AUXILIARY_FILE), &self.auxiliary, true)?;
        write_json(&dir.join(CONFIG_FILE), &self.config, true)?;
        write_json(&dir.join(MANIFEST_FILE), &self.manifest, true)?;

        info!(
            dir = %dir.display(),
            build_id = %self.manifest.build_id,
            shards = self.shards.len(),
            "Index artifacts written"
        );
        Ok(())
    }

    pub fn into_artifacts(self) -> IndexArtifacts {
        IndexArtifacts {
            manifest: self.manifest,
            shards: self.shards,
            auxiliary: self.auxiliary,
            config: self.config,
        }
    }
}

/// A published build as loaded by the serving side.
#[derive(Debug, Clone)]
pub struct IndexArtifacts {
    pub manifest: Manifest,
    pub shards: Vec<ShardIndex>,
    pub auxiliary: AuxiliaryData,
    pub config: ConfigEcho,
}

impl IndexArtifacts {
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let manifest: Manifest = read_json(&dir.join(MANIFEST_FILE))?;

        let mut shards = Vec::with_capacity(manifest.shards.len());
        for entry in &manifest.shards {
            let shard: ShardIndex = read_json(&dir.join(&entry.location))?;
            if shard.id != entry.id {
                return Err(Error::new(
                    ErrorKind::InvalidState,
                    format!("{} holds shard {}, manifest expects {}", entry.location, shard.id, entry.id),
                ));
            }
            shards.push(shard);
        }

        let auxiliary = read_json(&dir.join(AUXILIARY_FILE))?;
        let config = read_json(&dir.join(CONFIG_FILE))?;

        info!(
            dir = %dir.display(),
            build_id = %manifest.build_id,
            shards = shards.len(),
            "Index artifacts loaded"
        );

        Ok(IndexArtifacts { manifest, shards, auxiliary, config })
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T, pretty: bool) -> Result<()> {
    let bytes = if pretty {
        serde_json::to_vec_pretty(value)?
    } else {
        serde_json::to_vec(value)?
    };
    fs::write(path, bytes)?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = fs::read(path).map_err(|e| {
        Error::new(ErrorKind::NotFound, format!("{}: {}", path.display(), e))
    })?;
    Ok(serde_json::from_slice(&bytes)?)
}
