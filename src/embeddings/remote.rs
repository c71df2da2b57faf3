// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// EMBEDDER REMOTO (API COMPATÍVEL COM OPENAI)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// POST {base_url}/embeddings com {model, input: [...]}.
// Qualquer falha (rede, status, formato, dimensão) é devolvida como erro e o
// serviço cai para o fallback local.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{EmbeddingError, EmbeddingProvider};
use crate::config::EngineConfig;

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: Option<usize>,
}

/// Cliente de embeddings remoto
pub struct OpenAiEmbedder {
    api_key: String,
    model: String,
    base_url: String,
    dimension: usize,
    client: reqwest::Client,
}

impl OpenAiEmbedder {
    /// Cria cliente com modelo padrão (`text-embedding-3-small`, 1536 dims)
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            model: "text-embedding-3-small".into(),
            base_url: "https://api.openai.com/v1".into(),
            dimension: 1536,
            client: reqwest::Client::new(),
        }
    }

    /// Cria cliente a partir da configuração do motor
    pub fn from_config(config: &EngineConfig) -> Option<Self> {
        let api_key = config.api_key.clone()?;
        let client = reqwest::Client::builder()
            .timeout(config.embedding_timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .ok()?;

        Some(Self {
            api_key,
            dimension: dimension_for_model(&config.model),
            model: config.model.clone(),
            base_url: config.api_base_url.clone(),
            client,
        })
    }

    /// Define o modelo e a dimensão esperada
    pub fn with_model(mut self, model: &str, dimension: usize) -> Self {
        self.model = model.to_string();
        self.dimension = dimension;
        self
    }

    /// Define a URL base
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }
}

/// Dimensão conhecida dos modelos OpenAI
fn dimension_for_model(model: &str) -> usize {
    match model {
        "text-embedding-3-large" => 3072,
        _ => 1536,
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    fn method(&self) -> String {
        format!("openai:{}", self.model)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| EmbeddingError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::ApiError(format!("{}: {}", status, error_text)));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::ParseError(e.to_string()))?;

        order_embeddings(parsed.data, texts.len())
    }
}

/// Reordena pelo campo `index` quando presente
fn order_embeddings(mut data: Vec<EmbeddingData>, expected: usize) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    if data.len() != expected {
        return Err(EmbeddingError::BatchMismatch {
            expected,
            got: data.len(),
        });
    }

    if data.iter().all(|d| d.index.is_some()) {
        data.sort_by_key(|d| d.index.unwrap_or(usize::MAX));
    }

    Ok(data.into_iter().map(|d| d.embedding).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_includes_model() {
        let embedder = OpenAiEmbedder::new("key".into()).with_model("text-embedding-3-large", 3072);
        assert_eq!(embedder.method(), "openai:text-embedding-3-large");
        assert_eq!(EmbeddingProvider::dimension(&embedder), 3072);
    }

    #[test]
    fn test_from_config_requires_key() {
        let config = EngineConfig::default();
        assert!(OpenAiEmbedder::from_config(&config).is_none());

        let config = EngineConfig {
            api_key: Some("sk-test".into()),
            ..EngineConfig::default()
        };
        let embedder = OpenAiEmbedder::from_config(&config).unwrap();
        assert_eq!(EmbeddingProvider::dimension(&embedder), 1536);
    }

    #[test]
    fn test_response_is_reordered_by_index() {
        let json = r#"{"data": [
            {"embedding": [0.0, 1.0], "index": 1},
            {"embedding": [1.0, 0.0], "index": 0}
        ]}"#;
        let parsed: EmbeddingResponse = serde_json::from_str(json).unwrap();
        let vectors = order_embeddings(parsed.data, 2).unwrap();
        assert_eq!(vectors[0], vec![1.0, 0.0]);
    }

    #[test]
    fn test_batch_mismatch_is_error() {
        let parsed: EmbeddingResponse =
            serde_json::from_str(r#"{"data": [{"embedding": [1.0]}]}"#).unwrap();
        assert_eq!(
            order_embeddings(parsed.data, 2),
            Err(EmbeddingError::BatchMismatch { expected: 2, got: 1 })
        );
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_network_error() {
        let embedder = OpenAiEmbedder::new("key".into()).with_base_url("http://127.0.0.1:9");
        let result = embedder.embed_texts(&["texto".to_string()]).await;
        assert!(matches!(result, Err(EmbeddingError::NetworkError(_))));
    }
}
