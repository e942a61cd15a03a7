//! Embedding client abstraction and provider adapters.
//!
//! Every provider honours the same contract: one vector per input text, in input order, each
//! of the configured dimension. Any provider failure surfaces as
//! [`EmbeddingError::Unavailable`]; nothing here retries.

use std::sync::Arc;

use crate::config::{EmbeddingProvider, EmbeddingSettings};
use async_trait::async_trait;
use thiserror::Error;

mod ollama;
mod openai;

pub use ollama::OllamaClient;
pub use openai::OpenAiClient;

/// Errors raised by embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// Provider was unable to produce embeddings for the supplied input.
    #[error("Embedding provider unavailable: {0}")]
    Unavailable(String),
}

/// Interface implemented by embedding backends.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Length of every vector this client produces.
    fn dimension(&self) -> usize;

    /// Produce an embedding vector for each supplied text, preserving order.
    async fn generate_embeddings(&self, texts: Vec<String>)
    -> Result<Vec<Vec<f32>>, EmbeddingError>;
}

/// Check that a provider answered with one vector per input.
pub(crate) fn ensure_vector_count(
    expected: usize,
    vectors: Vec<Vec<f32>>,
) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    if vectors.len() == expected {
        Ok(vectors)
    } else {
        Err(EmbeddingError::Unavailable(format!(
            "provider returned {} vectors for {expected} inputs",
            vectors.len()
        )))
    }
}

/// Deterministic offline encoder hashing bytes into vector slots.
///
/// Identical texts always map to identical unit vectors, which is enough for exact-match
/// retrieval in tests and air-gapped smoke runs.
pub struct HashEmbeddingClient {
    dimension: usize,
}

impl HashEmbeddingClient {
    /// Construct a deterministic client producing vectors of `dimension` components.
    pub const fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn encode(text: &str, dimension: usize) -> Vec<f32> {
        let mut embedding = vec![0.0_f32; dimension];

        if text.is_empty() {
            return embedding;
        }

        for (idx, byte) in text.bytes().enumerate() {
            let position = (idx.wrapping_mul(31) ^ usize::from(byte)) % dimension;
            embedding[position] += f32::from(byte) / 255.0;
        }

        let norm = embedding
            .iter()
            .map(|value| value * value)
            .sum::<f32>()
            .sqrt();

        if norm > 0.0 {
            for value in &mut embedding {
                *value /= norm;
            }
        }

        embedding
    }
}

#[async_trait]
impl EmbeddingClient for HashEmbeddingClient {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if self.dimension == 0 {
            return Err(EmbeddingError::Unavailable(
                "embedding dimension must be greater than zero".to_string(),
            ));
        }

        Ok(texts
            .iter()
            .map(|text| Self::encode(text, self.dimension))
            .collect())
    }
}

/// Build an embedding client suitable for the supplied settings.
pub fn build_embedding_client(
    settings: &EmbeddingSettings,
) -> Result<Arc<dyn EmbeddingClient>, EmbeddingError> {
    tracing::debug!(
        provider = ?settings.provider,
        model = %settings.model,
        dimension = settings.dimension,
        "Building embedding client"
    );
    let client: Arc<dyn EmbeddingClient> = match settings.provider {
        EmbeddingProvider::Ollama => Arc::new(OllamaClient::new(
            &settings.ollama_url,
            &settings.model,
            settings.dimension,
        )?),
        EmbeddingProvider::OpenAI => Arc::new(OpenAiClient::new(
            &settings.openai_base_url,
            settings.openai_api_key.clone(),
            &settings.model,
            settings.dimension,
        )?),
        EmbeddingProvider::Hash => Arc::new(HashEmbeddingClient::new(settings.dimension)),
    };
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_client_is_deterministic_and_normalized() {
        let client = HashEmbeddingClient::new(16);
        let first = client
            .generate_embeddings(vec!["alpha".into(), "beta".into()])
            .await
            .expect("embeddings");
        let second = client
            .generate_embeddings(vec!["alpha".into()])
            .await
            .expect("embeddings");

        assert_eq!(first.len(), 2);
        assert_eq!(first[0], second[0]);
        assert_ne!(first[0], first[1]);
        let norm: f32 = first[0].iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
        assert!(first.iter().all(|vector| vector.len() == 16));
    }

    #[tokio::test]
    async fn hash_client_rejects_zero_dimension() {
        let client = HashEmbeddingClient::new(0);
        let err = client
            .generate_embeddings(vec!["x".into()])
            .await
            .expect_err("zero dimension");
        assert!(matches!(err, EmbeddingError::Unavailable(_)));
    }

    #[test]
    fn vector_count_mismatch_is_unavailable() {
        let err = ensure_vector_count(2, vec![vec![1.0]]).expect_err("count mismatch");
        assert!(err.to_string().contains("1 vectors for 2 inputs"));
        assert_eq!(ensure_vector_count(1, vec![vec![1.0]]).expect("ok").len(), 1);
    }
}
