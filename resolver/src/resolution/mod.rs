pub mod blocking;
pub mod cluster;
pub mod engine;
pub mod graph;
pub mod similarity;
pub mod types;

pub use blocking::{BlockingIndex, mention_tokens};
pub use cluster::{ScoredPair, cluster_entities, merge_cluster};
pub use engine::EntityResolver;
pub use graph::{
    EntityResolutionGraph, GraphSnapshot, RelationLink, ResolutionEdge, ResolutionLink,
    ResolutionNode,
};
pub use similarity::{SimilarityScorer, string_similarity, type_overlap};
pub use types::{
    Entity, EntityCluster, KnowledgeGraph, MentionRecord, Relation, RelationObject,
    ResolutionMethod, ResolutionStats, ResolvedEntity, SimilarityEdge,
};
