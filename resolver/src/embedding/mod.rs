pub mod openai;
pub mod provider;

pub use openai::OpenAiEmbeddingClient;
pub use provider::{EmbeddingProvider, EmbeddingPurpose, cosine_similarity};
