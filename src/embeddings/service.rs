// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// SERVIÇO DE EMBEDDINGS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// Fluxo de `embed_batch`:
// 1. Provider primário, com cache por (método, hash)
// 2. Falha do primário (rede, dimensão, NaN) → fallback determinístico,
//    lote marcado como degradado
// 3. Falha do fallback → erro; o motor roda a cascata só com sinais lexicais
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use std::collections::HashMap;
use std::sync::Arc;

use super::cache::{CacheKey, EmbeddingCache};
use super::local::{HashEmbedder, SubwordEmbedder};
use super::remote::OpenAiEmbedder;
use super::{content_hash, EmbeddingError, EmbeddingProvider, EmbeddingVector};
use crate::config::{EmbeddingBackend, EngineConfig};
use crate::types::TextUnit;

/// Resultado de um lote
#[derive(Debug, Clone)]
pub struct EmbeddingBatch {
    /// Vetores por id de unidade
    pub vectors: HashMap<String, EmbeddingVector>,
    /// Método efetivamente usado
    pub method: String,
    /// Fallback usado
    pub degraded: bool,
    /// Motivos da degradação
    pub notes: Vec<String>,
}

impl EmbeddingBatch {
    /// Vetor de uma unidade
    pub fn get(&self, unit_id: &str) -> Option<&EmbeddingVector> {
        self.vectors.get(unit_id)
    }
}

/// Serviço de embeddings com fallback e cache
#[derive(Clone)]
pub struct EmbeddingService {
    primary: Option<Arc<dyn EmbeddingProvider>>,
    fallback: Option<Arc<dyn EmbeddingProvider>>,
    cache: Arc<EmbeddingCache>,
}

impl Default for EmbeddingService {
    fn default() -> Self {
        Self::local_default()
    }
}

impl EmbeddingService {
    /// Primário informado + fallback `HashEmbedder`
    pub fn new(primary: Arc<dyn EmbeddingProvider>, cache: Arc<EmbeddingCache>) -> Self {
        Self {
            primary: Some(primary),
            fallback: Some(Arc::new(HashEmbedder::new())),
            cache,
        }
    }

    /// Modelo local padrão + fallback, cache padrão
    pub fn local_default() -> Self {
        Self::new(Arc::new(SubwordEmbedder::new()), Arc::new(EmbeddingCache::default()))
    }

    /// Modo degradado forçado: somente o fallback
    pub fn fallback_only() -> Self {
        Self {
            primary: None,
            fallback: Some(Arc::new(HashEmbedder::new())),
            cache: Arc::new(EmbeddingCache::default()),
        }
    }

    /// Primário sem fallback (falha → erro)
    pub fn without_fallback(primary: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            primary: Some(primary),
            fallback: None,
            cache: Arc::new(EmbeddingCache::default()),
        }
    }

    /// Substitui o fallback
    pub fn with_fallback(mut self, fallback: Arc<dyn EmbeddingProvider>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Substitui o cache (compartilhado entre serviços)
    pub fn with_cache(mut self, cache: Arc<EmbeddingCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Monta o serviço a partir da configuração do motor
    pub fn from_config(config: &EngineConfig) -> Self {
        let cache = Arc::new(EmbeddingCache::new(config.cache_size));

        match config.backend {
            EmbeddingBackend::Subword => Self::new(Arc::new(SubwordEmbedder::new()), cache),
            EmbeddingBackend::Hash => Self::fallback_only().with_cache(cache),
            EmbeddingBackend::OpenAi => match OpenAiEmbedder::from_config(config) {
                Some(remote) => Self::new(Arc::new(remote), cache)
                    .with_fallback(Arc::new(SubwordEmbedder::new())),
                None => {
                    log::warn!("[embeddings] Remote backend unavailable, using local model");
                    Self::new(Arc::new(SubwordEmbedder::new()), cache)
                }
            },
        }
    }

    /// Serviço sem primário (degradado por configuração)
    pub fn is_forced_fallback(&self) -> bool {
        self.primary.is_none()
    }

    /// Cache compartilhado
    pub fn cache(&self) -> &EmbeddingCache {
        &self.cache
    }

    /// Método do provider primário (ou do fallback)
    pub fn preferred_method(&self) -> String {
        self.primary
            .as_ref()
            .or(self.fallback.as_ref())
            .map(|p| p.method())
            .unwrap_or_else(|| "none".to_string())
    }

    /// Gera o vetor de uma unidade
    pub async fn embed(&self, unit: &TextUnit) -> Result<EmbeddingVector, EmbeddingError> {
        let batch = self.embed_batch(std::slice::from_ref(unit)).await?;
        batch
            .vectors
            .get(&unit.id)
            .cloned()
            .ok_or_else(|| EmbeddingError::BatchMismatch { expected: 1, got: 0 })
    }

    /// Gera vetores para um lote de unidades
    pub async fn embed_batch(&self, units: &[TextUnit]) -> Result<EmbeddingBatch, EmbeddingError> {
        let mut notes = Vec::new();
        let mut primary_error = None;

        if let Some(primary) = &self.primary {
            match self.embed_with(primary.as_ref(), units).await {
                Ok(vectors) => {
                    return Ok(EmbeddingBatch {
                        vectors,
                        method: primary.method(),
                        degraded: false,
                        notes,
                    });
                }
                Err(e) => {
                    log::warn!(
                        "[embeddings] Primary provider {} failed: {}; using fallback",
                        primary.method(),
                        e
                    );
                    notes.push(format!("primary {} failed: {}", primary.method(), e));
                    primary_error = Some(e);
                }
            }
        } else {
            notes.push("primary provider disabled".to_string());
        }

        // Sem fallback: erro tipado do primário, se houve
        let Some(fallback) = &self.fallback else {
            return Err(primary_error.unwrap_or_else(|| EmbeddingError::Unavailable(notes.join("; "))));
        };

        let vectors = self.embed_with(fallback.as_ref(), units).await?;
        Ok(EmbeddingBatch {
            vectors,
            method: fallback.method(),
            degraded: true,
            notes,
        })
    }

    /// Embeds via provider, usando o cache para textos já vistos
    async fn embed_with(
        &self,
        provider: &dyn EmbeddingProvider,
        units: &[TextUnit],
    ) -> Result<HashMap<String, EmbeddingVector>, EmbeddingError> {
        let method = provider.method();
        let dimension = provider.dimension();

        let hashes: Vec<String> = units.iter().map(|u| content_hash(&u.text)).collect();
        let mut resolved: HashMap<String, Arc<Vec<f32>>> = HashMap::new();
        let mut missing_hashes: Vec<String> = Vec::new();
        let mut missing_texts: Vec<String> = Vec::new();

        for (unit, hash) in units.iter().zip(hashes.iter()) {
            if resolved.contains_key(hash) || missing_hashes.contains(hash) {
                continue;
            }
            match self.cache.get(&CacheKey::new(method.clone(), hash.clone())) {
                Some(vector) => {
                    resolved.insert(hash.clone(), vector);
                }
                None => {
                    missing_hashes.push(hash.clone());
                    missing_texts.push(unit.text.clone());
                }
            }
        }

        if !missing_texts.is_empty() {
            log::debug!(
                "[embeddings] {} cache misses, {} hits ({})",
                missing_texts.len(),
                resolved.len(),
                method
            );

            let computed = provider.embed_texts(&missing_texts).await?;
            if computed.len() != missing_texts.len() {
                return Err(EmbeddingError::BatchMismatch {
                    expected: missing_texts.len(),
                    got: computed.len(),
                });
            }

            // Valida o lote inteiro antes de tocar no cache
            for vector in &computed {
                validate_vector(vector, dimension)?;
            }

            for (hash, vector) in missing_hashes.into_iter().zip(computed) {
                let canonical = self
                    .cache
                    .insert(CacheKey::new(method.clone(), hash.clone()), Arc::new(vector));
                resolved.insert(hash, canonical);
            }
        }

        let mut vectors = HashMap::with_capacity(units.len());
        for (unit, hash) in units.iter().zip(hashes) {
            let Some(vector) = resolved.get(&hash) else {
                return Err(EmbeddingError::BatchMismatch {
                    expected: units.len(),
                    got: vectors.len(),
                });
            };
            vectors.insert(
                unit.id.clone(),
                EmbeddingVector {
                    unit_id: unit.id.clone(),
                    vector: Arc::clone(vector),
                    method: method.clone(),
                    content_hash: hash,
                },
            );
        }

        Ok(vectors)
    }
}

fn validate_vector(vector: &[f32], dimension: usize) -> Result<(), EmbeddingError> {
    if vector.len() != dimension {
        return Err(EmbeddingError::InvalidDimension {
            expected: dimension,
            got: vector.len(),
        });
    }
    if vector.iter().any(|x| !x.is_finite()) {
        return Err(EmbeddingError::NonFinite);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Side, UnitLevel};
    use async_trait::async_trait;
    use mockall::mock;

    mock! {
        pub Provider {}

        #[async_trait]
        impl EmbeddingProvider for Provider {
            fn method(&self) -> String;
            fn dimension(&self) -> usize;
            async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;
        }
    }

    fn unit(id: &str, text: &str) -> TextUnit {
        TextUnit {
            id: id.to_string(),
            side: Side::Source,
            level: UnitLevel::Sentence,
            text: text.to_string(),
            start_offset: 0,
            end_offset: text.len(),
            parent_id: None,
            index: 0,
        }
    }

    fn failing_provider() -> MockProvider {
        let mut provider = MockProvider::new();
        provider.expect_method().return_const("mock-4".to_string());
        provider.expect_dimension().return_const(4usize);
        provider
            .expect_embed_texts()
            .returning(|_| Err(EmbeddingError::NetworkError("connection refused".into())));
        provider
    }

    #[tokio::test]
    async fn test_primary_success_is_not_degraded() {
        let service = EmbeddingService::local_default();
        let units = vec![unit("a", "Este texto é complexo."), unit("b", "Precisa ser simplificado.")];

        let batch = service.embed_batch(&units).await.unwrap();
        assert!(!batch.degraded);
        assert_eq!(batch.method, "subword-512");
        assert_eq!(batch.vectors.len(), 2);
    }

    #[tokio::test]
    async fn test_cache_hit_is_value_identical() {
        let service = EmbeddingService::local_default();
        let first = service.embed(&unit("a", "Texto repetido.")).await.unwrap();
        let second = service.embed(&unit("b", "Texto repetido.")).await.unwrap();

        assert!(Arc::ptr_eq(&first.vector, &second.vector));
        assert_eq!(first.content_hash, second.content_hash);
        assert_eq!(service.cache().stats().hits, 1);
    }

    #[tokio::test]
    async fn test_duplicate_texts_in_batch_are_computed_once() {
        let mut provider = MockProvider::new();
        provider.expect_method().return_const("mock-2".to_string());
        provider.expect_dimension().return_const(2usize);
        provider
            .expect_embed_texts()
            .times(1)
            .withf(|texts| texts.len() == 1)
            .returning(|_| Ok(vec![vec![1.0, 0.0]]));

        let service = EmbeddingService::without_fallback(Arc::new(provider));
        let batch = service
            .embed_batch(&[unit("a", "igual"), unit("b", "igual")])
            .await
            .unwrap();
        assert_eq!(batch.vectors.len(), 2);
    }

    #[tokio::test]
    async fn test_primary_failure_falls_back() {
        let service = EmbeddingService::new(Arc::new(failing_provider()), Arc::new(EmbeddingCache::new(16)));
        let batch = service.embed_batch(&[unit("a", "Texto.")]).await.unwrap();

        assert!(batch.degraded);
        assert_eq!(batch.method, "fnv1a-256");
        assert!(batch.notes[0].contains("connection refused"));
    }

    #[tokio::test]
    async fn test_wrong_dimension_is_provider_failure() {
        let mut provider = MockProvider::new();
        provider.expect_method().return_const("mock-4".to_string());
        provider.expect_dimension().return_const(4usize);
        provider
            .expect_embed_texts()
            .returning(|texts| Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect()));

        let service = EmbeddingService::new(Arc::new(provider), Arc::new(EmbeddingCache::new(16)));
        let batch = service.embed_batch(&[unit("a", "Texto.")]).await.unwrap();
        assert!(batch.degraded);
        assert!(!service.cache().contains(&CacheKey::new("mock-4", content_hash("Texto."))));
    }

    #[tokio::test]
    async fn test_nan_vector_is_rejected() {
        let mut provider = MockProvider::new();
        provider.expect_method().return_const("mock-2".to_string());
        provider.expect_dimension().return_const(2usize);
        provider
            .expect_embed_texts()
            .returning(|_| Ok(vec![vec![f32::NAN, 0.0]]));

        let service = EmbeddingService::without_fallback(Arc::new(provider));
        let result = service.embed_batch(&[unit("a", "Texto.")]).await;
        assert_eq!(result.unwrap_err(), EmbeddingError::NonFinite);
    }

    #[tokio::test]
    async fn test_catastrophic_failure_without_fallback() {
        let service = EmbeddingService::without_fallback(Arc::new(failing_provider()));
        let result = service.embed_batch(&[unit("a", "Texto.")]).await;
        assert!(matches!(result, Err(EmbeddingError::NetworkError(_))));
    }

    #[tokio::test]
    async fn test_fallback_only_is_always_degraded() {
        let service = EmbeddingService::fallback_only();
        assert!(service.is_forced_fallback());
        let batch = service.embed_batch(&[unit("a", "Texto.")]).await.unwrap();
        assert!(batch.degraded);
        assert_eq!(service.preferred_method(), "fnv1a-256");
    }

    #[test]
    fn test_empty_batch_is_empty() {
        let service = EmbeddingService::local_default();
        let batch = tokio_test::block_on(service.embed_batch(&[])).unwrap();
        assert!(batch.vectors.is_empty());
        assert!(!batch.degraded);
    }

    #[test]
    fn test_from_config_hash_backend() {
        let config = EngineConfig {
            backend: EmbeddingBackend::Hash,
            ..EngineConfig::default()
        };
        let service = EmbeddingService::from_config(&config);
        assert!(service.is_forced_fallback());
        assert_eq!(service.cache().stats().capacity, 4096);
    }
}
