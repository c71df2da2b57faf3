// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// SIMD - SINGLE INSTRUCTION, MULTIPLE DATA
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// Operações vetoriais do motor de similaridade.
//
// - Cosseno com AVX2 + FMA quando disponível (8 floats por instrução),
//   com fallback escalar
// - Matrizes de similaridade |A|×|B| com linhas em paralelo (Rayon)
// - Variante em banda diagonal para parágrafos muito longos
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(target_arch = "x86_64")]
use std::arch::x86_64::*;

use rayon::prelude::*;

/// Similaridade cosseno - implementação simples (fallback)
///
/// # Fórmula
/// ```text
/// cos(θ) = (A · B) / (||A|| × ||B||)
/// ```
///
/// Vetores de tamanhos diferentes ou com norma zero têm similaridade 0.
pub fn cosine_similarity_scalar(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let mut dot_product = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for i in 0..a.len() {
        dot_product += a[i] * b[i];
        norm_a += a[i] * a[i];
        norm_b += b[i] * b[i];
    }

    finish_cosine(dot_product, norm_a, norm_b)
}

/// Similaridade cosseno com AVX2 (256-bit SIMD)
///
/// # Safety
///
/// O caller deve garantir que a CPU suporta AVX2 e FMA.
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2", enable = "fma")]
pub unsafe fn cosine_similarity_avx2(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let len = a.len();

    let mut dot_acc = _mm256_setzero_ps();
    let mut norm_a_acc = _mm256_setzero_ps();
    let mut norm_b_acc = _mm256_setzero_ps();

    let chunks = len / 8;
    for i in 0..chunks {
        let offset = i * 8;
        let va = _mm256_loadu_ps(a.as_ptr().add(offset));
        let vb = _mm256_loadu_ps(b.as_ptr().add(offset));

        // FMA: a*b + acc em 1 instrução
        dot_acc = _mm256_fmadd_ps(va, vb, dot_acc);
        norm_a_acc = _mm256_fmadd_ps(va, va, norm_a_acc);
        norm_b_acc = _mm256_fmadd_ps(vb, vb, norm_b_acc);
    }

    let mut dot = hsum_avx2(dot_acc);
    let mut norm_a = hsum_avx2(norm_a_acc);
    let mut norm_b = hsum_avx2(norm_b_acc);

    // Resto (len % 8)
    for i in (chunks * 8)..len {
        dot += a[i] * b[i];
        norm_a += a[i] * a[i];
        norm_b += b[i] * b[i];
    }

    finish_cosine(dot, norm_a, norm_b)
}

/// Soma horizontal de 8 floats em um registro AVX2
#[cfg(target_arch = "x86_64")]
#[inline]
#[target_feature(enable = "avx2")]
unsafe fn hsum_avx2(v: __m256) -> f32 {
    let sum1 = _mm256_hadd_ps(v, v);
    let sum2 = _mm256_hadd_ps(sum1, sum1);
    let low = _mm256_castps256_ps128(sum2);
    let high = _mm256_extractf128_ps(sum2, 1);
    _mm_cvtss_f32(_mm_add_ss(low, high))
}

#[inline]
fn finish_cosine(dot: f32, norm_a: f32, norm_b: f32) -> f32 {
    let denominator = norm_a.sqrt() * norm_b.sqrt();
    if denominator <= f32::EPSILON || !denominator.is_finite() {
        return 0.0;
    }
    (dot / denominator).clamp(-1.0, 1.0)
}

/// Seleciona automaticamente a melhor implementação disponível
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("avx2") && is_x86_feature_detected!("fma") {
            return unsafe { cosine_similarity_avx2(a, b) };
        }
    }

    cosine_similarity_scalar(a, b)
}

/// Matriz densa de similaridades (linha = origem, coluna = destino)
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityMatrix {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

impl SimilarityMatrix {
    /// Matriz vazia
    pub fn empty() -> Self {
        Self {
            rows: 0,
            cols: 0,
            data: Vec::new(),
        }
    }

    /// Cria matriz a partir de linhas; células são limitadas a [0, 1]
    pub fn from_rows(rows: Vec<Vec<f32>>) -> Self {
        let row_count = rows.len();
        let cols = rows.first().map(Vec::len).unwrap_or(0);
        let mut data = Vec::with_capacity(row_count * cols);
        for row in rows {
            for j in 0..cols {
                let value = row.get(j).copied().unwrap_or(0.0);
                data.push(if value.is_finite() { value.clamp(0.0, 1.0) } else { 0.0 });
            }
        }
        if cols == 0 {
            return Self {
                rows: row_count,
                cols: 0,
                data: Vec::new(),
            };
        }
        Self {
            rows: row_count,
            cols,
            data,
        }
    }

    /// Número de linhas (origem)
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Número de colunas (destino)
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Sem células
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Valor de uma célula (0 fora dos limites)
    pub fn get(&self, row: usize, col: usize) -> f32 {
        if row >= self.rows || col >= self.cols {
            return 0.0;
        }
        self.data[row * self.cols + col]
    }

    /// Sobrescreve uma célula
    pub fn set(&mut self, row: usize, col: usize, value: f32) {
        if row < self.rows && col < self.cols {
            self.data[row * self.cols + col] = value.clamp(0.0, 1.0);
        }
    }

    /// Linha inteira
    pub fn row(&self, row: usize) -> &[f32] {
        if row >= self.rows {
            return &[];
        }
        &self.data[row * self.cols..(row + 1) * self.cols]
    }
}

/// Matriz de similaridade cosseno entre dois conjuntos de vetores.
///
/// Pura; entradas vazias geram matriz vazia.
pub fn similarity_matrix(a: &[&[f32]], b: &[&[f32]]) -> SimilarityMatrix {
    if a.is_empty() || b.is_empty() {
        return SimilarityMatrix::empty();
    }

    let rows: Vec<Vec<f32>> = a
        .par_iter()
        .map(|query| {
            b.iter()
                .map(|candidate| cosine_similarity(query, candidate))
                .collect()
        })
        .collect();

    SimilarityMatrix::from_rows(rows)
}

/// Matriz em banda: só calcula células a até `window` colunas da diagonal
/// proporcional; as demais ficam em 0.
pub fn banded_similarity_matrix(a: &[&[f32]], b: &[&[f32]], window: usize) -> SimilarityMatrix {
    if a.is_empty() || b.is_empty() {
        return SimilarityMatrix::empty();
    }

    let rows: Vec<Vec<f32>> = a
        .par_iter()
        .enumerate()
        .map(|(i, query)| {
            let (lo, hi) = band_limits(i, a.len(), b.len(), window);
            (0..b.len())
                .map(|j| {
                    if j >= lo && j <= hi {
                        cosine_similarity(query, b[j])
                    } else {
                        0.0
                    }
                })
                .collect()
        })
        .collect();

    SimilarityMatrix::from_rows(rows)
}

/// Colunas `[lo, hi]` da banda para a linha `row`
pub fn band_limits(row: usize, rows: usize, cols: usize, window: usize) -> (usize, usize) {
    if rows == 0 || cols == 0 {
        return (0, 0);
    }
    let center = ((row as f64 + 0.5) * cols as f64 / rows as f64).floor() as usize;
    let center = center.min(cols - 1);
    let lo = center.saturating_sub(window);
    let hi = (center + window).min(cols - 1);
    (lo, hi)
}

/// Soma de vetores (dimensões iguais); vazio → vetor vazio
pub fn sum_vectors(vectors: &[&[f32]]) -> Vec<f32> {
    let Some(first) = vectors.first() else {
        return Vec::new();
    };
    let mut sum = vec![0.0f32; first.len()];
    for vector in vectors {
        for (acc, value) in sum.iter_mut().zip(vector.iter()) {
            *acc += value;
        }
    }
    sum
}

/// Produto escalar otimizado (dot product)
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    #[cfg(target_arch = "x86_64")]
    {
        if a.len() == b.len() && is_x86_feature_detected!("avx2") && is_x86_feature_detected!("fma") {
            return unsafe { dot_product_avx2(a, b) };
        }
    }

    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2", enable = "fma")]
unsafe fn dot_product_avx2(a: &[f32], b: &[f32]) -> f32 {
    let len = a.len().min(b.len());

    let mut acc = _mm256_setzero_ps();
    let chunks = len / 8;

    for i in 0..chunks {
        let offset = i * 8;
        let va = _mm256_loadu_ps(a.as_ptr().add(offset));
        let vb = _mm256_loadu_ps(b.as_ptr().add(offset));
        acc = _mm256_fmadd_ps(va, vb, acc);
    }

    let mut result = hsum_avx2(acc);
    for i in (chunks * 8)..len {
        result += a[i] * b[i];
    }

    result
}

/// Norma L2 (magnitude do vetor)
pub fn l2_norm(v: &[f32]) -> f32 {
    dot_product(v, v).sqrt()
}

/// Normaliza um vetor para ter norma L2 = 1
pub fn normalize(v: &mut [f32]) {
    let norm = l2_norm(v);
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}
