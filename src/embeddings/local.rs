// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// EMBEDDERS LOCAIS (FEATURE HASHING)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// Dois modelos locais sem download de pesos:
//
// - SubwordEmbedder (padrão): unigramas de palavras + trigramas de caracteres,
//   FNV-1a em 512 dimensões. Stopwords entram com peso reduzido e sem
//   trigramas. Captura variações morfológicas ("simplificado"/"simplificar").
// - HashEmbedder (fallback): bag-of-words FNV-1a em 256 dimensões.
//   Puramente lexical, determinístico e sempre disponível.
//
// Trabalho de CPU roda no blocking pool do Tokio, com Rayon por texto.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use std::sync::Arc;

use async_trait::async_trait;
use rayon::prelude::*;

use super::{EmbeddingError, EmbeddingProvider};
use crate::performance::simd::normalize;
use crate::utils::{is_stopword, tokenize};

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Hash FNV-1a de 64 bits
pub fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

#[inline]
fn bucket(feature: &str, dimension: usize) -> usize {
    (fnv1a(feature.as_bytes()) % dimension as u64) as usize
}

/// Codificador síncrono de texto em vetor.
///
/// Usado diretamente pela saliência semântica (token × unidade) e,
/// via `EmbeddingProvider`, pelo serviço de embeddings.
pub trait LocalEncoder: Send + Sync {
    /// Identificador do método
    fn method_name(&self) -> String;

    /// Dimensão
    fn dimension(&self) -> usize;

    /// Codifica um texto (vetor L2-normalizado; texto vazio → zeros)
    fn encode(&self, text: &str) -> Vec<f32>;
}

/// Modelo local padrão: palavras + trigramas de caracteres
#[derive(Debug, Clone)]
pub struct SubwordEmbedder {
    dimension: usize,
    trigram_weight: f32,
    stopword_weight: f32,
}

impl Default for SubwordEmbedder {
    fn default() -> Self {
        Self {
            dimension: 512,
            trigram_weight: 0.3,
            stopword_weight: 0.25,
        }
    }
}

impl SubwordEmbedder {
    /// Cria embedder com dimensão padrão (512)
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a dimensão
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension.max(1);
        self
    }
}

impl LocalEncoder for SubwordEmbedder {
    fn method_name(&self) -> String {
        format!("subword-{}", self.dimension)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn encode(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];

        for token in tokenize(text) {
            let word = token.normalized();
            if is_stopword(&word) {
                vector[bucket(&format!("w:{}", word), self.dimension)] += self.stopword_weight;
                continue;
            }

            vector[bucket(&format!("w:{}", word), self.dimension)] += 1.0;

            let padded: Vec<char> = format!("<{}>", word).chars().collect();
            for window in padded.windows(3) {
                let trigram: String = window.iter().collect();
                vector[bucket(&format!("c:{}", trigram), self.dimension)] += self.trigram_weight;
            }
        }

        normalize(&mut vector);
        vector
    }
}

/// Fallback determinístico: bag-of-words
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self { dimension: 256 }
    }
}

impl HashEmbedder {
    /// Cria embedder com dimensão padrão (256)
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a dimensão
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension.max(1);
        self
    }
}

impl LocalEncoder for HashEmbedder {
    fn method_name(&self) -> String {
        format!("fnv1a-{}", self.dimension)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn encode(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        for token in tokenize(text) {
            vector[bucket(&token.normalized(), self.dimension)] += 1.0;
        }
        normalize(&mut vector);
        vector
    }
}

/// Roda o encoder no blocking pool, paralelizando por texto
async fn encode_blocking<E>(encoder: E, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>
where
    E: LocalEncoder + 'static,
{
    if texts.is_empty() {
        return Ok(Vec::new());
    }

    let texts: Arc<Vec<String>> = Arc::new(texts.to_vec());
    tokio::task::spawn_blocking(move || {
        texts
            .par_iter()
            .map(|text| encoder.encode(text))
            .collect::<Vec<_>>()
    })
    .await
    .map_err(|e| EmbeddingError::WorkerError(e.to_string()))
}

#[async_trait]
impl EmbeddingProvider for SubwordEmbedder {
    fn method(&self) -> String {
        self.method_name()
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        encode_blocking(self.clone(), texts).await
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    fn method(&self) -> String {
        self.method_name()
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        encode_blocking(self.clone(), texts).await
    }
}
