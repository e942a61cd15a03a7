use async_trait::async_trait;
use ollama_rs::{
    Ollama,
    generation::embeddings::request::{EmbeddingsInput, GenerateEmbeddingsRequest},
};

use super::{EmbeddingClient, EmbeddingError, ensure_vector_count};

/// Embedding client backed by a local Ollama runtime (`/api/embed`).
pub struct OllamaClient {
    ollama: Ollama,
    model: String,
    dimension: usize,
}

impl OllamaClient {
    /// Build a client for the Ollama instance at `base_url`.
    pub fn new(base_url: &str, model: &str, dimension: usize) -> Result<Self, EmbeddingError> {
        let url = reqwest::Url::parse(base_url)
            .map_err(|err| EmbeddingError::Unavailable(format!("invalid OLLAMA_URL: {err}")))?;
        let host = url.host_str().ok_or_else(|| {
            EmbeddingError::Unavailable(format!("OLLAMA_URL has no host: {base_url}"))
        })?;
        let port = url.port_or_known_default().unwrap_or(11434);
        tracing::debug!(host, port, model, "Initialized Ollama embedding client");

        Ok(Self {
            ollama: Ollama::new(format!("{}://{host}", url.scheme()), port),
            model: model.to_string(),
            dimension,
        })
    }
}

#[async_trait]
impl EmbeddingClient for OllamaClient {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let expected = texts.len();
        let request =
            GenerateEmbeddingsRequest::new(self.model.clone(), EmbeddingsInput::Multiple(texts));
        let response = self
            .ollama
            .generate_embeddings(request)
            .await
            .map_err(|err| {
                tracing::error!(model = %self.model, error = %err, "Ollama embedding request failed");
                EmbeddingError::Unavailable(err.to_string())
            })?;

        ensure_vector_count(expected, response.embeddings)
    }
}
