use std::sync::Arc;

use localrag_core::config::EmbeddingSettings;
use localrag_core::traits::{Embedder, Vectorizer};
use localrag_core::types::Vector;
use localrag_core::Error;
use localrag_embed::{get_default_embedder, DenseVectorizer, FakeEmbedder, DEFAULT_DIM};

#[test]
fn fake_embedder_shapes_and_determinism() {
    // Force fake embedder to avoid loading a model from disk
    std::env::set_var("APP_USE_FAKE_EMBEDDINGS", "1");

    let embedder = get_default_embedder(&EmbeddingSettings::default()).expect("embedder");
    let texts = vec!["hello world".to_string(), "hello world".to_string()];
    let embs = embedder.embed_batch(&texts).expect("embed_batch");
    let (v1, v2) = (&embs[0], &embs[1]);

    assert_eq!(v1.len(), DEFAULT_DIM);
    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");
    for (a, b) in v1.iter().zip(v2.iter()) { assert!((a - b).abs() <= 1e-6); }
}

struct Scaled(usize);

impl Embedder for Scaled {
    fn dim(&self) -> usize { self.0 }
    fn max_len(&self) -> usize { 16 }
    fn model_id(&self) -> &str { "scaled" }
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|_| vec![3.0; self.0]).collect())
    }
}

struct WrongWidth;

impl Embedder for WrongWidth {
    fn dim(&self) -> usize { 4 }
    fn max_len(&self) -> usize { 16 }
    fn model_id(&self) -> &str { "wrong" }
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|_| vec![1.0; 3]).collect())
    }
}

struct Failing;

impl Embedder for Failing {
    fn dim(&self) -> usize { 4 }
    fn max_len(&self) -> usize { 16 }
    fn model_id(&self) -> &str { "failing" }
    fn embed_batch(&self, _texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        anyhow::bail!("device lost")
    }
}

#[test]
fn dense_vectorizer_renormalizes_backend_output() {
    let vectorizer = DenseVectorizer::new(Arc::new(Scaled(4)), 2);
    let texts: Vec<String> = (0..5).map(|i| format!("text {i}")).collect();
    let vectors = vectorizer.vectorize_batch(&texts).expect("vectorize");
    assert_eq!(vectors.len(), 5, "batches of 2 cover all inputs");
    for v in vectors {
        assert!(matches!(v, Vector::Dense(_)));
        assert!((v.l2_norm() - 1.0).abs() < 1e-5);
    }
}

#[test]
fn dense_vectorizer_rejects_wrong_width() {
    let vectorizer = DenseVectorizer::new(Arc::new(WrongWidth), 8);
    let err = vectorizer.vectorize("anything").unwrap_err();
    assert!(matches!(err, Error::EmbeddingBackend(_)), "{err}");
}

#[test]
fn backend_failure_maps_to_embedding_error() {
    let vectorizer = DenseVectorizer::new(Arc::new(Failing), 8);
    match vectorizer.vectorize("anything").unwrap_err() {
        Error::EmbeddingBackend(msg) => assert!(msg.contains("device lost"), "{msg}"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn fake_embedder_places_shared_tokens_closer() {
    let embedder = FakeEmbedder::new(64);
    let texts = ["train signal light", "train signal", "brake pad wear"].map(String::from);
    let embs = embedder.embed_batch(&texts).unwrap();
    let dot = |a: &[f32], b: &[f32]| a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>();
    assert!(dot(&embs[0], &embs[1]) > dot(&embs[0], &embs[2]));
}
