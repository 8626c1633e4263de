pub mod config;
pub mod embedding;
pub mod resolution;

pub use config::ResolutionConfig;
pub use embedding::{EmbeddingProvider, EmbeddingPurpose, OpenAiEmbeddingClient, cosine_similarity};
pub use resolution::{
    Entity, EntityResolutionGraph, EntityResolver, KnowledgeGraph, Relation, RelationObject,
    ResolutionMethod, ResolvedEntity,
};
