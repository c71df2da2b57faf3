//! Benchmarks de operações SIMD e vetoriais.
//!
//! Testa performance de:
//! - Similaridade cosseno (scalar vs AVX2)
//! - Produto escalar (dot product)
//! - Matriz de similaridade completa vs em banda
//! - Soma de vetores (grupos de divisão)
//!
//! Executar: `cargo bench --bench simd_bench`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::Rng;
use simplification_engine::performance::simd::{
    banded_similarity_matrix, cosine_similarity, cosine_similarity_scalar, dot_product, normalize,
    similarity_matrix, sum_vectors,
};

/// Gera vetor aleatório normalizado
fn generate_random_embedding(dim: usize) -> Vec<f32> {
    let mut rng = rand::thread_rng();
    let mut v: Vec<f32> = (0..dim).map(|_| rng.gen_range(-1.0..1.0)).collect();
    normalize(&mut v);
    v
}

/// Gera múltiplos embeddings
fn generate_embeddings(count: usize, dim: usize) -> Vec<Vec<f32>> {
    (0..count).map(|_| generate_random_embedding(dim)).collect()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// BENCHMARK: Similaridade Cosseno
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn bench_cosine_similarity(c: &mut Criterion) {
    let mut group = c.benchmark_group("cosine_similarity");

    for size in [64, 256, 512, 1536].iter() {
        let a = generate_random_embedding(*size);
        let b = generate_random_embedding(*size);

        group.throughput(Throughput::Elements(*size as u64));

        group.bench_with_input(BenchmarkId::new("scalar", size), size, |bencher, _| {
            bencher.iter(|| black_box(cosine_similarity_scalar(&a, &b)))
        });

        group.bench_with_input(BenchmarkId::new("auto", size), size, |bencher, _| {
            bencher.iter(|| black_box(cosine_similarity(&a, &b)))
        });
    }

    group.finish();
}

fn bench_dot_product(c: &mut Criterion) {
    let mut group = c.benchmark_group("dot_product");

    for size in [512, 1536].iter() {
        let a = generate_random_embedding(*size);
        let b = generate_random_embedding(*size);
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::new("optimized", size), size, |bencher, _| {
            bencher.iter(|| black_box(dot_product(&a, &b)))
        });
    }

    group.finish();
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// BENCHMARK: Matrizes
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn bench_similarity_matrix(c: &mut Criterion) {
    let mut group = c.benchmark_group("similarity_matrix");
    group.sample_size(20);

    for sentences in [10, 40, 120].iter() {
        let a = generate_embeddings(*sentences, 512);
        let b = generate_embeddings(*sentences, 512);
        let ra: Vec<&[f32]> = a.iter().map(Vec::as_slice).collect();
        let rb: Vec<&[f32]> = b.iter().map(Vec::as_slice).collect();

        group.throughput(Throughput::Elements((*sentences * *sentences) as u64));

        group.bench_with_input(BenchmarkId::new("full", sentences), sentences, |bencher, _| {
            bencher.iter(|| black_box(similarity_matrix(&ra, &rb)))
        });

        group.bench_with_input(BenchmarkId::new("banded_8", sentences), sentences, |bencher, _| {
            bencher.iter(|| black_box(banded_similarity_matrix(&ra, &rb, 8)))
        });
    }

    group.finish();
}

fn bench_sum_vectors(c: &mut Criterion) {
    let vectors = generate_embeddings(4, 512);
    let refs: Vec<&[f32]> = vectors.iter().map(Vec::as_slice).collect();

    c.bench_function("sum_vectors_4x512", |bencher| {
        bencher.iter(|| black_box(sum_vectors(&refs)))
    });
}

criterion_group!(
    benches,
    bench_cosine_similarity,
    bench_dot_product,
    bench_similarity_matrix,
    bench_sum_vectors
);
criterion_main!(benches);
