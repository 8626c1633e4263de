use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Weights and thresholds for one resolution run.
///
/// The blocking and concurrency fields are tuning knobs, not semantic
/// contracts; cluster membership is independent of them.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResolutionConfig {
    /// Minimum blended gate score for a candidate pair to become an edge.
    pub merge_threshold: f32,
    pub string_weight: f32,
    pub type_weight: f32,
    pub neighbor_weight: f32,
    /// Weight of embedding cosine similarity. Zero disables embedding
    /// lookups for the whole run.
    pub embedding_weight: f32,
    pub require_type_overlap: bool,
    pub min_type_overlap: f32,
    /// Entity count at which the blocking index replaces the exhaustive
    /// pairwise scan.
    pub blocking_threshold: usize,
    /// Posting lists larger than this are treated as uninformative.
    pub max_block_size: usize,
    pub embed_concurrency: usize,
    pub scan_concurrency: usize,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            merge_threshold: 0.7,
            string_weight: 0.4,
            type_weight: 0.2,
            neighbor_weight: 0.15,
            embedding_weight: 0.25,
            require_type_overlap: true,
            min_type_overlap: 0.1,
            blocking_threshold: 50,
            max_block_size: 50,
            embed_concurrency: 5,
            scan_concurrency: 50,
        }
    }
}

impl ResolutionConfig {
    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        serde_yaml::from_str(raw).context("invalid resolution config")
    }

    pub async fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_yaml_str(&raw)
    }
}
