pub mod anthropic;
pub mod embeddings;
pub mod ollama;
pub mod openai;

pub use anthropic::AnthropicClient;
pub use embeddings::{
    bytes_to_vector, cosine_distance, cosine_similarity, vector_to_bytes, HashEmbedder,
    OpenAiEmbedder,
};
pub use ollama::OllamaClient;
pub use openai::OpenAiClient;
