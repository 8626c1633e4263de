use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub mention: String,
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub attributes: HashMap<String, Value>,
    #[serde(default)]
    pub chunk_index: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationObject {
    Entity(String),
    Literal(Value),
}

impl RelationObject {
    pub fn as_entity_id(&self) -> Option<&str> {
        match self {
            Self::Entity(id) => Some(id),
            Self::Literal(_) => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relation {
    pub subject_id: String,
    pub predicate: String,
    pub object: RelationObject,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnowledgeGraph {
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub relations: Vec<Relation>,
}

/// Provenance copy of one input entity, kept as a leaf node of the
/// resolution graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MentionRecord {
    pub id: String,
    pub mention: String,
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub chunk_index: Option<usize>,
}

impl MentionRecord {
    pub fn from_entity(entity: &Entity) -> Self {
        Self {
            id: entity.id.clone(),
            mention: entity.mention.clone(),
            types: entity.types.clone(),
            chunk_index: entity.chunk_index,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMethod {
    Exact,
    Lexical,
    Containment,
    SharedNeighbor,
    Embedding,
}

impl ResolutionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Lexical => "lexical",
            Self::Containment => "containment",
            Self::SharedNeighbor => "shared_neighbor",
            Self::Embedding => "embedding",
        }
    }
}

/// Undirected edge attribute between two entities in the clustering graph.
/// Consumed by component extraction and discarded afterwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityEdge {
    pub similarity: f32,
    pub method: ResolutionMethod,
}

#[derive(Debug, Clone)]
pub struct EntityCluster {
    pub entities: Vec<Entity>,
    pub min_similarity: f32,
    pub methods: BTreeSet<ResolutionMethod>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedEntity {
    pub canonical_id: String,
    pub mention: String,
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub attributes: HashMap<String, Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionStats {
    pub mention_count: usize,
    pub resolved_count: usize,
    pub relation_count: usize,
    pub cluster_count: usize,
}
