// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// EMBEDDINGS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// Vetores de tamanho fixo para unidades de texto.
//
// - `EmbeddingProvider`: trait de qualquer backend (local ou remoto)
// - `SubwordEmbedder`: modelo local padrão (palavras + trigramas)
// - `HashEmbedder`: fallback determinístico sempre disponível
// - `OpenAiEmbedder`: API remota compatível com OpenAI
// - `EmbeddingService`: primário + fallback + cache LRU por (método, hash)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

mod cache;
mod local;
mod remote;
mod service;

pub use cache::{CacheKey, CacheStats, EmbeddingCache};
pub use local::{fnv1a, HashEmbedder, LocalEncoder, SubwordEmbedder};
pub use remote::OpenAiEmbedder;
pub use service::{EmbeddingBatch, EmbeddingService};

use std::sync::Arc;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

/// Erros de embedding
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EmbeddingError {
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Invalid response format: {0}")]
    ParseError(String),

    #[error("Invalid vector: expected {expected} dims, got {got}")]
    InvalidDimension { expected: usize, got: usize },

    #[error("Invalid vector: non-finite values")]
    NonFinite,

    #[error("Batch size mismatch: expected {expected}, got {got}")]
    BatchMismatch { expected: usize, got: usize },

    #[error("Worker failure: {0}")]
    WorkerError(String),
}

/// Vetor de uma unidade, compartilhado (somente leitura) com o cache
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingVector {
    /// Unidade
    pub unit_id: String,
    /// Vetor (mesmo `Arc` guardado no cache)
    pub vector: Arc<Vec<f32>>,
    /// Método que produziu o vetor
    pub method: String,
    /// SHA-256 do texto
    pub content_hash: String,
}

/// Trait para backends de embedding.
///
/// Permite substituir o modelo sem tocar no restante do pipeline.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Identificador do método (entra na chave do cache)
    fn method(&self) -> String;

    /// Dimensão dos vetores produzidos
    fn dimension(&self) -> usize;

    /// Gera um vetor por texto, na mesma ordem
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;
}

/// Hash de conteúdo (SHA-256 hex) usado como chave de cache
pub fn content_hash(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))
}
