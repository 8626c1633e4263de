use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use crate::config::ResolutionConfig;
use crate::embedding::{EmbeddingProvider, EmbeddingPurpose};

use super::blocking::BlockingIndex;
use super::cluster::{ScoredPair, cluster_entities, merge_cluster};
use super::graph::{EntityResolutionGraph, build_resolution_graph};
use super::similarity::SimilarityScorer;
use super::types::{Entity, EntityCluster, KnowledgeGraph, ResolvedEntity, SimilarityEdge};

/// Single-pass, threshold-driven entity resolution over one knowledge
/// graph value. Degrades on embedding failures instead of aborting.
pub struct EntityResolver {
    provider: Arc<dyn EmbeddingProvider>,
    config: ResolutionConfig,
}

impl EntityResolver {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, config: ResolutionConfig) -> Self {
        Self { provider, config }
    }

    pub fn config(&self) -> &ResolutionConfig {
        &self.config
    }

    pub async fn resolve(&self, input: &KnowledgeGraph) -> Result<EntityResolutionGraph> {
        let embeddings = self.fetch_embeddings(&input.entities).await;
        let scorer = SimilarityScorer::new(&self.config, &embeddings, &input.relations);

        let clusters = self.cluster(&input.entities, &scorer).await;
        let resolved: Vec<ResolvedEntity> = clusters.iter().map(merge_cluster).collect();

        let graph = build_resolution_graph(
            &input.entities,
            &input.relations,
            &clusters,
            resolved,
            &scorer,
        );
        info!(
            run_id = %graph.run_id,
            mentions = graph.stats.mention_count,
            resolved = graph.stats.resolved_count,
            relations = graph.stats.relation_count,
            "resolved knowledge graph"
        );
        Ok(graph)
    }

    /// Embedding batch fetch with bounded concurrency. A provider
    /// failure degrades that single entity to "no embedding"; the whole
    /// map is collected before any scoring starts.
    async fn fetch_embeddings(&self, entities: &[Entity]) -> HashMap<String, Vec<f32>> {
        if self.config.embedding_weight <= 0.0 || entities.is_empty() {
            return HashMap::new();
        }

        stream::iter(entities)
            .map(|entity| {
                let provider = Arc::clone(&self.provider);
                async move {
                    match provider
                        .embed(&entity.mention, EmbeddingPurpose::EntityResolution)
                        .await
                    {
                        Ok(vector) => Some((entity.id.clone(), vector)),
                        Err(err) => {
                            warn!(
                                entity_id = %entity.id,
                                error = %err,
                                "embedding failed, resolving without vector"
                            );
                            None
                        }
                    }
                }
            })
            .buffer_unordered(self.config.embed_concurrency.max(1))
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .flatten()
            .collect()
    }

    /// Candidate scan with bounded concurrency: one task per entity
    /// index, each returning its own slice of qualifying edges. The
    /// flattened list is sorted by index pair so downstream output is
    /// deterministic.
    async fn cluster(
        &self,
        entities: &[Entity],
        scorer: &SimilarityScorer<'_>,
    ) -> Vec<EntityCluster> {
        if entities.len() <= 1 {
            return cluster_entities(entities, &[]);
        }

        let index = BlockingIndex::build(entities, &self.config);
        let mut pairs: Vec<ScoredPair> = stream::iter(0..entities.len())
            .map(|i| {
                let index = &index;
                async move { scan_candidates(entities, i, index, scorer) }
            })
            .buffer_unordered(self.config.scan_concurrency.max(1))
            .collect::<Vec<Vec<ScoredPair>>>()
            .await
            .into_iter()
            .flatten()
            .collect();
        pairs.sort_by_key(|pair| (pair.left, pair.right));

        cluster_entities(entities, &pairs)
    }
}

fn scan_candidates(
    entities: &[Entity],
    i: usize,
    index: &BlockingIndex,
    scorer: &SimilarityScorer<'_>,
) -> Vec<ScoredPair> {
    let left = &entities[i];
    index
        .candidates_for(i, &left.mention)
        .into_iter()
        .filter_map(|j| {
            let right = &entities[j];
            if !scorer.should_consider_merge(left, right) {
                return None;
            }
            Some(ScoredPair {
                left: i,
                right: j,
                edge: SimilarityEdge {
                    similarity: scorer.entity_similarity(left, right),
                    method: scorer.detect_method(left, right),
                },
            })
        })
        .collect()
}
