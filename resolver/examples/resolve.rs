use std::env;
use std::sync::Arc;

use anyhow::{Context, Result};
use dotenvy::dotenv;
use tracing_subscriber::EnvFilter;

use resolver::{
    Entity, EntityResolver, KnowledgeGraph, OpenAiEmbeddingClient, Relation, RelationObject,
    ResolutionConfig,
};

fn entity(id: &str, mention: &str, types: &[&str]) -> Entity {
    Entity {
        id: id.to_string(),
        mention: mention.to_string(),
        types: types.iter().map(|t| t.to_string()).collect(),
        attributes: Default::default(),
        chunk_index: None,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let api_key = env::var("OPENAI_API_KEY").with_context(|| "OPENAI_API_KEY not set in env")?;
    let provider = Arc::new(OpenAiEmbeddingClient::new(api_key, None));
    let resolver = EntityResolver::new(provider, ResolutionConfig::default());

    let input = KnowledgeGraph {
        entities: vec![
            entity("e1", "Eze", &["Person"]),
            entity("e2", "Eberechi Eze", &["Person", "Athlete"]),
            entity("e3", "Crystal Palace", &["Club"]),
            entity("e4", "Crystal Palace Football Club", &["Club"]),
        ],
        relations: vec![Relation {
            subject_id: "e1".to_string(),
            predicate: "plays_for".to_string(),
            object: RelationObject::Entity("e3".to_string()),
        }],
    };

    let graph = resolver.resolve(&input).await?;
    let snapshot = graph.snapshot();
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}
