use std::collections::HashMap;

use chrono::{DateTime, Utc};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use super::similarity::SimilarityScorer;
use super::types::{
    Entity, EntityCluster, MentionRecord, Relation, ResolutionMethod, ResolutionStats,
    ResolvedEntity,
};

#[derive(Debug, Clone)]
pub enum ResolutionNode {
    Mention(MentionRecord),
    Resolved(ResolvedEntity),
}

#[derive(Debug, Clone)]
pub enum ResolutionEdge {
    /// Mention -> its canonical entity.
    Resolution {
        confidence: f32,
        method: ResolutionMethod,
    },
    /// Canonical entity -> canonical entity. `grounded` is a placeholder
    /// for a later evidence-verification pass.
    Relation { predicate: String, grounded: bool },
}

/// The two-tier provenance artifact: mention leaves linked to their
/// canonical entities, and canonicalized relations between canonical
/// entities. Recomputed from scratch on every invocation and never
/// mutated afterwards.
pub struct EntityResolutionGraph {
    pub graph: DiGraph<ResolutionNode, ResolutionEdge>,
    /// Every input entity id -> its cluster's canonical id. Total over
    /// the input entity set.
    pub canonical_map: HashMap<String, String>,
    /// Mention id -> its node in the graph.
    pub entity_index: HashMap<String, NodeIndex>,
    pub stats: ResolutionStats,
    pub run_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolutionLink {
    pub mention_id: String,
    pub canonical_id: String,
    pub confidence: f32,
    pub method: ResolutionMethod,
}

#[derive(Debug, Clone, Serialize)]
pub struct RelationLink {
    pub subject_id: String,
    pub object_id: String,
    pub predicate: String,
    pub grounded: bool,
}

/// Flat serializable view of the graph for downstream consumers.
#[derive(Debug, Clone, Serialize)]
pub struct GraphSnapshot {
    pub run_id: String,
    pub created_at: DateTime<Utc>,
    pub stats: ResolutionStats,
    pub mentions: Vec<MentionRecord>,
    pub resolved: Vec<ResolvedEntity>,
    pub resolution_links: Vec<ResolutionLink>,
    pub relation_links: Vec<RelationLink>,
}

impl EntityResolutionGraph {
    pub fn snapshot(&self) -> GraphSnapshot {
        let mut mentions = Vec::new();
        let mut resolved = Vec::new();
        for node in self.graph.node_weights() {
            match node {
                ResolutionNode::Mention(record) => mentions.push(record.clone()),
                ResolutionNode::Resolved(entity) => resolved.push(entity.clone()),
            }
        }

        let mut resolution_links = Vec::new();
        let mut relation_links = Vec::new();
        for edge in self.graph.edge_references() {
            match edge.weight() {
                ResolutionEdge::Resolution { confidence, method } => {
                    let ResolutionNode::Mention(record) = &self.graph[edge.source()] else {
                        continue;
                    };
                    let ResolutionNode::Resolved(target) = &self.graph[edge.target()] else {
                        continue;
                    };
                    resolution_links.push(ResolutionLink {
                        mention_id: record.id.clone(),
                        canonical_id: target.canonical_id.clone(),
                        confidence: *confidence,
                        method: *method,
                    });
                }
                ResolutionEdge::Relation { predicate, grounded } => {
                    let ResolutionNode::Resolved(subject) = &self.graph[edge.source()] else {
                        continue;
                    };
                    let ResolutionNode::Resolved(object) = &self.graph[edge.target()] else {
                        continue;
                    };
                    relation_links.push(RelationLink {
                        subject_id: subject.canonical_id.clone(),
                        object_id: object.canonical_id.clone(),
                        predicate: predicate.clone(),
                        grounded: *grounded,
                    });
                }
            }
        }

        GraphSnapshot {
            run_id: self.run_id.clone(),
            created_at: self.created_at,
            stats: self.stats,
            mentions,
            resolved,
            resolution_links,
            relation_links,
        }
    }
}

/// Assembles the final graph: resolved nodes first, then one mention
/// node per input entity with a resolution edge to its canonical
/// entity, then relation edges for relations whose endpoints both
/// canonicalize. Everything else is dropped here.
pub(crate) fn build_resolution_graph(
    entities: &[Entity],
    relations: &[Relation],
    clusters: &[EntityCluster],
    resolved: Vec<ResolvedEntity>,
    scorer: &SimilarityScorer<'_>,
) -> EntityResolutionGraph {
    let mut canonical_map: HashMap<String, String> = HashMap::with_capacity(entities.len());
    for (cluster, merged) in clusters.iter().zip(resolved.iter()) {
        for member in &cluster.entities {
            canonical_map.insert(member.id.clone(), merged.canonical_id.clone());
        }
    }

    let by_id: HashMap<&str, &Entity> = entities.iter().map(|e| (e.id.as_str(), e)).collect();

    let mut graph: DiGraph<ResolutionNode, ResolutionEdge> = DiGraph::new();
    let mut resolved_index: HashMap<String, NodeIndex> = HashMap::with_capacity(resolved.len());
    let resolved_count = resolved.len();
    for merged in resolved {
        let canonical_id = merged.canonical_id.clone();
        let node = graph.add_node(ResolutionNode::Resolved(merged));
        resolved_index.insert(canonical_id, node);
    }

    let mut entity_index: HashMap<String, NodeIndex> = HashMap::with_capacity(entities.len());
    for entity in entities {
        let record = MentionRecord::from_entity(entity);
        let node = graph.add_node(ResolutionNode::Mention(record));
        entity_index.insert(entity.id.clone(), node);

        let canonical_id = &canonical_map[&entity.id];
        // Confidence is recomputed against the canonical member rather
        // than reused from the clustering-time edge; transitively-linked
        // members may never have been directly compared, and the
        // recomputed value may land below the merge threshold.
        let (confidence, method) = if &entity.id == canonical_id {
            (1.0, ResolutionMethod::Exact)
        } else {
            let canonical = by_id[canonical_id.as_str()];
            (
                scorer.entity_similarity(entity, canonical),
                scorer.detect_method(entity, canonical),
            )
        };
        graph.add_edge(
            node,
            resolved_index[canonical_id],
            ResolutionEdge::Resolution { confidence, method },
        );
    }

    let mut relation_count = 0usize;
    for relation in relations {
        let Some(object_id) = relation.object.as_entity_id() else {
            debug!(
                subject = %relation.subject_id,
                predicate = %relation.predicate,
                "dropping literal-valued relation"
            );
            continue;
        };
        let (Some(subject_canonical), Some(object_canonical)) = (
            canonical_map.get(&relation.subject_id),
            canonical_map.get(object_id),
        ) else {
            debug!(
                subject = %relation.subject_id,
                object = %object_id,
                predicate = %relation.predicate,
                "dropping relation with unresolved endpoint"
            );
            continue;
        };

        graph.add_edge(
            resolved_index[subject_canonical],
            resolved_index[object_canonical],
            ResolutionEdge::Relation {
                predicate: relation.predicate.clone(),
                grounded: false,
            },
        );
        relation_count += 1;
    }

    EntityResolutionGraph {
        graph,
        canonical_map,
        entity_index,
        stats: ResolutionStats {
            mention_count: entities.len(),
            resolved_count,
            relation_count,
            cluster_count: clusters.len(),
        },
        run_id: format!("resolution-{}", Uuid::new_v4()),
        created_at: Utc::now(),
    }
}
