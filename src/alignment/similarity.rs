// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// SIMILARIDADE ENTRE UNIDADES
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// Duas fontes de similaridade atrás da mesma trait:
// - Semântica: cosseno entre embeddings (SIMD + Rayon)
// - Lexical: cosseno de conjuntos de palavras de conteúdo (modo lexical-only)
//
// Textos idênticos têm similaridade exatamente 1.0 nas duas.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use std::collections::{HashMap, HashSet};

use rayon::prelude::*;

use crate::embeddings::{EmbeddingBatch, EmbeddingVector};
use crate::performance::simd::band_limits;
use crate::performance::{
    banded_similarity_matrix, cosine_similarity, similarity_matrix, sum_vectors, SimilarityMatrix,
};
use crate::types::TextUnit;
use crate::utils::{content_set, normalized_words, set_cosine};

/// Similaridade entre unidades de texto
pub trait UnitSimilarity: Send + Sync {
    /// Identificador do método
    fn method(&self) -> String;

    /// Matriz |a|×|b|; com `window`, só células na banda diagonal
    fn matrix(&self, a: &[&TextUnit], b: &[&TextUnit], window: Option<usize>) -> SimilarityMatrix;

    /// Similaridade da unidade contra um grupo tratado como um só texto
    fn combined(&self, source: &TextUnit, group: &[&TextUnit]) -> f32;

    /// Similaridade de um par
    fn pair(&self, a: &TextUnit, b: &TextUnit) -> f32 {
        self.combined(a, &[b])
    }
}

/// Similaridade por embeddings
#[derive(Debug, Clone, Default)]
pub struct SemanticSimilarity {
    vectors: HashMap<String, EmbeddingVector>,
    method: String,
}

impl SemanticSimilarity {
    /// Cria a partir dos lotes de origem e destino
    pub fn from_batches(source: &EmbeddingBatch, target: &EmbeddingBatch) -> Self {
        let mut vectors = source.vectors.clone();
        vectors.extend(target.vectors.iter().map(|(k, v)| (k.clone(), v.clone())));
        Self {
            vectors,
            method: source.method.clone(),
        }
    }

    /// Vetor de uma unidade
    pub fn vector(&self, unit_id: &str) -> Option<&EmbeddingVector> {
        self.vectors.get(unit_id)
    }

    fn same_content(&self, a: &TextUnit, b: &TextUnit) -> bool {
        if a.text == b.text {
            return true;
        }
        match (self.vectors.get(&a.id), self.vectors.get(&b.id)) {
            (Some(va), Some(vb)) => va.content_hash == vb.content_hash,
            _ => false,
        }
    }

    fn slice_of(&self, unit: &TextUnit) -> &[f32] {
        self.vectors
            .get(&unit.id)
            .map(|v| v.vector.as_slice())
            .unwrap_or(&[])
    }
}

impl UnitSimilarity for SemanticSimilarity {
    fn method(&self) -> String {
        self.method.clone()
    }

    fn matrix(&self, a: &[&TextUnit], b: &[&TextUnit], window: Option<usize>) -> SimilarityMatrix {
        let va: Vec<&[f32]> = a.iter().map(|u| self.slice_of(u)).collect();
        let vb: Vec<&[f32]> = b.iter().map(|u| self.slice_of(u)).collect();

        let mut matrix = match window {
            Some(w) => banded_similarity_matrix(&va, &vb, w),
            None => similarity_matrix(&va, &vb),
        };

        for (i, unit_a) in a.iter().enumerate() {
            for (j, unit_b) in b.iter().enumerate() {
                if let Some(w) = window {
                    let (lo, hi) = band_limits(i, a.len(), b.len(), w);
                    if j < lo || j > hi {
                        continue;
                    }
                }
                if self.same_content(unit_a, unit_b) {
                    matrix.set(i, j, 1.0);
                } else if va[i].is_empty() || vb[j].is_empty() {
                    // Unidade sem vetor: cai para o sinal lexical
                    matrix.set(i, j, lexical_similarity(unit_a, unit_b));
                }
            }
        }

        matrix
    }

    fn combined(&self, source: &TextUnit, group: &[&TextUnit]) -> f32 {
        if let [single] = group {
            if self.same_content(source, single) {
                return 1.0;
            }
        }

        let query = self.slice_of(source);
        let members: Vec<&[f32]> = group.iter().map(|u| self.slice_of(u)).collect();
        if query.is_empty() || members.iter().any(|m| m.is_empty()) {
            return lexical_combined(source, group);
        }

        let summed = sum_vectors(&members);
        cosine_similarity(query, &summed).clamp(0.0, 1.0)
    }
}

/// Similaridade lexical (sem embeddings)
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalSimilarity;

impl LexicalSimilarity {
    /// Cria similaridade lexical
    pub fn new() -> Self {
        Self
    }
}

impl UnitSimilarity for LexicalSimilarity {
    fn method(&self) -> String {
        "lexical".to_string()
    }

    fn matrix(&self, a: &[&TextUnit], b: &[&TextUnit], window: Option<usize>) -> SimilarityMatrix {
        if a.is_empty() || b.is_empty() {
            return SimilarityMatrix::empty();
        }

        let rows: Vec<Vec<f32>> = a
            .par_iter()
            .enumerate()
            .map(|(i, unit_a)| {
                let (lo, hi) = match window {
                    Some(w) => band_limits(i, a.len(), b.len(), w),
                    None => (0, b.len() - 1),
                };
                b.iter()
                    .enumerate()
                    .map(|(j, unit_b)| {
                        if j < lo || j > hi {
                            0.0
                        } else {
                            lexical_similarity(unit_a, unit_b)
                        }
                    })
                    .collect()
            })
            .collect();

        SimilarityMatrix::from_rows(rows)
    }

    fn combined(&self, source: &TextUnit, group: &[&TextUnit]) -> f32 {
        lexical_combined(source, group)
    }
}

fn word_set(text: &str) -> HashSet<String> {
    let content = content_set(text);
    if content.is_empty() {
        normalized_words(text).into_iter().collect()
    } else {
        content
    }
}

/// Cosseno de conjuntos entre duas unidades
pub fn lexical_similarity(a: &TextUnit, b: &TextUnit) -> f32 {
    if a.text == b.text {
        return 1.0;
    }
    set_cosine(&word_set(&a.text), &word_set(&b.text))
}

fn lexical_combined(source: &TextUnit, group: &[&TextUnit]) -> f32 {
    if let [single] = group {
        return lexical_similarity(source, single);
    }
    let joined: HashSet<String> = group.iter().flat_map(|u| word_set(&u.text)).collect();
    set_cosine(&word_set(&source.text), &joined)
}
