//! Módulo de otimizações de performance.
//!
//! Cada análise compara todas as sentenças de um parágrafo contra todas
//! as sentenças do parágrafo alinhado, e todos os parágrafos entre si.
//! Essas matrizes de similaridade são o gargalo do alinhamento.
//!
//! ## Técnicas Utilizadas
//!
//! - **SIMD (AVX2)**: Processa 8 floats por instrução
//! - **Paralelismo**: Linhas da matriz via Rayon
//! - **Banda diagonal**: parágrafos longos só comparam vizinhos

/// Operações vetoriais otimizadas com SIMD.
///
/// - [`cosine_similarity`]: Similaridade entre dois vetores
/// - [`similarity_matrix`]: Matriz |A|×|B| em paralelo
/// - [`banded_similarity_matrix`]: Matriz em banda diagonal
///
/// Usa instruções AVX2 quando disponíveis (x86_64),
/// com fallback para implementação escalar.
pub mod simd;

pub use simd::{
    banded_similarity_matrix, cosine_similarity, similarity_matrix,
    sum_vectors, SimilarityMatrix,
};
