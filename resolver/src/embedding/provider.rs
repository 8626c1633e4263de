use anyhow::Result;
use async_trait::async_trait;

/// What an embedding is requested for. Providers may route purposes to
/// different models or tag usage per purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingPurpose {
    EntityResolution,
    Query,
}

impl EmbeddingPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EntityResolution => "entity_resolution",
            Self::Query => "query",
        }
    }
}

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str, purpose: EmbeddingPurpose) -> Result<Vec<f32>>;
}

/// Cosine similarity in [-1, 1]. Mismatched or empty vectors score 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|y| y * y).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}
