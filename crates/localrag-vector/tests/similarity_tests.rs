use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use localrag_core::types::Vector;
use localrag_vector::{cosine, top_k};

fn random_unit(rng: &mut StdRng, dim: usize) -> Vector {
    let values: Vec<f32> = (0..dim).map(|_| rng.gen_range(-1.0f32..1.0)).collect();
    Vector::Dense(values).normalized()
}

/// Coarse values so that many corpus entries tie exactly.
fn quantized(rng: &mut StdRng, dim: usize) -> Vector {
    Vector::Dense((0..dim).map(|_| rng.gen_range(0..3) as f32).collect())
}

fn full_sort(query: &Vector, corpus: &[Vector], k: usize) -> Vec<(usize, f32)> {
    let mut all: Vec<(usize, f32)> = corpus.iter().enumerate().map(|(i, v)| (i, cosine(query, v))).collect();
    all.sort_by(|a, b| b.1.total_cmp(&a.1));
    all.truncate(k);
    all
}

#[test]
fn cosine_is_symmetric_and_self_similar() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..50 {
        let a = random_unit(&mut rng, 16);
        let b = random_unit(&mut rng, 16);
        assert_eq!(cosine(&a, &b), cosine(&b, &a));
        assert!((cosine(&a, &a) - 1.0).abs() < 1e-5);
    }
}

#[test]
fn bounded_top_k_matches_full_sort() {
    let mut rng = StdRng::seed_from_u64(42);
    for round in 0..40 {
        let n = rng.gen_range(0..120);
        let corpus: Vec<Vector> = (0..n).map(|_| random_unit(&mut rng, 8)).collect();
        let query = random_unit(&mut rng, 8);
        for k in [0, 1, 3, 10, n, n + 5] {
            let got: Vec<(usize, f32)> = top_k(&query, &corpus, k).iter().map(|s| (s.index, s.score)).collect();
            assert_eq!(got, full_sort(&query, &corpus, k), "round {round} n={n} k={k}");
        }
    }
}

#[test]
fn bounded_top_k_matches_full_sort_with_ties() {
    let mut rng = StdRng::seed_from_u64(1234);
    for round in 0..40 {
        let corpus: Vec<Vector> = (0..60).map(|_| quantized(&mut rng, 3)).collect();
        let query = quantized(&mut rng, 3);
        for k in [1, 2, 7, 30, 60] {
            let got: Vec<(usize, f32)> = top_k(&query, &corpus, k).iter().map(|s| (s.index, s.score)).collect();
            assert_eq!(got, full_sort(&query, &corpus, k), "round {round} k={k}");
        }
    }
}
