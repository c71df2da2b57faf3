// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// CACHE DE EMBEDDINGS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// Cache LRU limitado, chaveado por (método, hash do conteúdo).
// Único recurso compartilhado entre requisições concorrentes.
//
// - Misses concorrentes podem recomputar o mesmo vetor
// - O primeiro `Arc` inserido vence; nunca há resultado duplicado
// - Lock envenenado vira miss, nunca panic
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use lru::LruCache;
use serde::{Deserialize, Serialize};

/// Capacidade padrão
pub const DEFAULT_CACHE_SIZE: usize = 4096;

/// Chave do cache
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    /// Método do provider
    pub method: String,
    /// SHA-256 do texto
    pub content_hash: String,
}

impl CacheKey {
    /// Cria chave
    pub fn new(method: impl Into<String>, content_hash: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            content_hash: content_hash.into(),
        }
    }
}

/// Estatísticas do cache
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Total de hits
    pub hits: u64,
    /// Total de misses
    pub misses: u64,
    /// Entradas atuais
    pub entries: usize,
    /// Capacidade
    pub capacity: usize,
    /// Entradas removidas pelo LRU
    pub evictions: u64,
    /// Taxa de hit (0.0 - 1.0)
    pub hit_rate: f64,
}

/// Cache LRU thread-safe de vetores
pub struct EmbeddingCache {
    store: Mutex<LruCache<CacheKey, Arc<Vec<f32>>>>,
    capacity: NonZeroUsize,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl Default for EmbeddingCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_SIZE)
    }
}

impl std::fmt::Debug for EmbeddingCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingCache")
            .field("capacity", &self.capacity)
            .field("stats", &self.stats())
            .finish()
    }
}

impl EmbeddingCache {
    /// Cria cache com capacidade (mínimo 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            store: Mutex::new(LruCache::new(capacity)),
            capacity,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Recupera vetor do cache
    pub fn get(&self, key: &CacheKey) -> Option<Arc<Vec<f32>>> {
        let found = self
            .store
            .lock()
            .ok()
            .and_then(|mut store| store.get(key).cloned());

        match found {
            Some(vector) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(vector)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Insere vetor e retorna o `Arc` canônico.
    ///
    /// Se outra requisição inseriu antes, o vetor existente é mantido e
    /// devolvido no lugar do novo.
    pub fn insert(&self, key: CacheKey, vector: Arc<Vec<f32>>) -> Arc<Vec<f32>> {
        let Ok(mut store) = self.store.lock() else {
            return vector;
        };

        if let Some(existing) = store.get(&key) {
            return Arc::clone(existing);
        }

        if store.len() >= self.capacity.get() {
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
        store.put(key, Arc::clone(&vector));
        vector
    }

    /// Verifica se a chave existe (sem alterar a ordem LRU)
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.store
            .lock()
            .map(|store| store.contains(key))
            .unwrap_or(false)
    }

    /// Limpa todas as entradas
    pub fn clear(&self) {
        if let Ok(mut store) = self.store.lock() {
            store.clear();
        }
    }

    /// Retorna número de entradas
    pub fn len(&self) -> usize {
        self.store.lock().map(|s| s.len()).unwrap_or(0)
    }

    /// Verifica se está vazio
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Retorna estatísticas do cache
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;

        CacheStats {
            hits,
            misses,
            entries: self.len(),
            capacity: self.capacity.get(),
            evictions: self.evictions.load(Ordering::Relaxed),
            hit_rate: if total > 0 {
                hits as f64 / total as f64
            } else {
                0.0
            },
        }
    }

    /// Resumo legível
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Embedding cache: {}/{} entries, {} hits, {} misses ({:.1}% hit rate), {} evictions",
            stats.entries,
            stats.capacity,
            stats.hits,
            stats.misses,
            stats.hit_rate * 100.0,
            stats.evictions
        )
    }
}
