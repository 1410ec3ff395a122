use anyhow::{Result, anyhow};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use candle_core::{Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig, DTYPE};
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

use localrag_core::config::{expand_path, EmbeddingSettings};
use localrag_core::traits::Embedder;

pub mod device;
pub mod pool;
pub mod tokenize;
pub mod vectorizer;

pub use device::select_device;
pub use pool::masked_mean_l2;
pub use tokenize::tokenize_on_device;
pub use vectorizer::{DenseFactory, DenseVectorizer};

/// Width of all-MiniLM-L6-v2 and of the fake embedder by default.
pub const DEFAULT_DIM: usize = 384;

/// Sentence-transformer style BERT encoder: masked mean pooling of the last
/// hidden state followed by L2 normalization.
pub struct EmbeddingModel {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    model_id: String,
    dim: usize,
    max_len: usize,
}

impl EmbeddingModel {
    pub fn load(settings: &EmbeddingSettings) -> Result<Self> {
        let device = select_device();
        let model_dir = resolve_model_dir(settings)?;
        info!(model = %settings.model, dir = %model_dir.display(), "Loading embedding model");

        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;

        let config_path = model_dir.join("config.json");
        let config: BertConfig = serde_json::from_str(&std::fs::read_to_string(&config_path)?)?;
        let dim = config.hidden_size;

        let safetensors = model_dir.join("model.safetensors");
        let vb = if safetensors.exists() {
            // Safety: the weights file is not modified while the model is alive.
            unsafe { VarBuilder::from_mmaped_safetensors(&[safetensors], DTYPE, &device)? }
        } else {
            let weights_path = model_dir.join("pytorch_model.bin");
            let weights = candle_core::pickle::read_all(&weights_path)
                .map_err(|e| anyhow!("Failed to read weights from {}: {}", weights_path.display(), e))?;
            let weights_map: std::collections::HashMap<String, Tensor> = weights.into_iter().collect();
            VarBuilder::from_tensors(weights_map, DTYPE, &device)
        };
        let model = BertModel::load(vb, &config)?;
        info!(dim, "Embedding model loaded");
        Ok(Self { model, tokenizer, device, model_id: settings.model.clone(), dim, max_len: settings.max_len })
    }

    pub fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let start = Instant::now();
        let (input_ids, attention_mask) = tokenize_on_device(&self.tokenizer, text, self.max_len, &self.device)?;
        let token_type_ids = input_ids.zeros_like()?;
        let hidden = self.model.forward(&input_ids, &token_type_ids, Some(&attention_mask))?;
        let pooled = masked_mean_l2(&hidden, &attention_mask)?;
        let emb = pooled.to_device(&Device::Cpu)?.squeeze(0)?.to_vec1::<f32>()?;
        if emb.len() != self.dim {
            return Err(anyhow!("Model produced {} values, expected {}", emb.len(), self.dim));
        }
        let elapsed = start.elapsed().as_millis();
        if elapsed > 100 { debug!(elapsed_ms = elapsed as u64, "Slow embedding"); }
        Ok(emb)
    }
}

impl Embedder for EmbeddingModel {
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { self.max_len }
    fn model_id(&self) -> &str { &self.model_id }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed_text(t)).collect()
    }
}

/// Hashed bag-of-words stand-in for a real model. Deterministic, unit length,
/// and texts sharing tokens land close together.
#[derive(Debug, Clone)]
pub struct FakeEmbedder { dim: usize, model_id: String }

impl FakeEmbedder {
    pub fn new(dim: usize) -> Self { Self { dim, model_id: format!("fake-hash-{dim}") } }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        use std::hash::{Hash, Hasher};
        use twox_hash::XxHash64;
        let mut v = vec![0f32; self.dim];
        for token in text.split_whitespace() {
            let token = token.to_lowercase();
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h % self.dim as u64) as usize;
            v[idx] += 0.5 + ((h >> 32) as u32) as f32 / u32::MAX as f32;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 { for x in &mut v { *x /= norm; } }
        v
    }
}

impl Default for FakeEmbedder {
    fn default() -> Self { Self::new(DEFAULT_DIM) }
}

impl Embedder for FakeEmbedder {
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { usize::MAX }
    fn model_id(&self) -> &str { &self.model_id }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

fn use_fake_embeddings() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// The configured embedder, or the fake one when `APP_USE_FAKE_EMBEDDINGS` is set.
pub fn get_default_embedder(settings: &EmbeddingSettings) -> Result<Arc<dyn Embedder>> {
    if use_fake_embeddings() {
        info!("Using FakeEmbedder");
        return Ok(Arc::new(FakeEmbedder::default()));
    }
    Ok(Arc::new(EmbeddingModel::load(settings)?))
}

/// Model directory lookup order: `APP_MODEL_DIR`, `MODEL_DIR`,
/// `embedding.model_dir`, then `models/<name>` and `../models/<name>`.
pub fn resolve_model_dir(settings: &EmbeddingSettings) -> Result<PathBuf> {
    for var in ["APP_MODEL_DIR", "MODEL_DIR"] {
        if let Ok(dir) = std::env::var(var) {
            let p = expand_path(&dir);
            if p.exists() { debug!(%var, dir = %p.display(), "Using model dir from env"); return Ok(p); }
            warn!(%var, dir = %p.display(), "Model dir from env does not exist");
        }
    }
    if let Some(dir) = &settings.model_dir {
        let p = expand_path(dir);
        if p.exists() { return Ok(p); }
        warn!(dir = %p.display(), "Configured model dir does not exist");
    }
    let name = settings.model.rsplit('/').next().unwrap_or(&settings.model);
    for root in ["models", "../models"] {
        let p = Path::new(root).join(name);
        if p.exists() { return Ok(p); }
    }
    Err(anyhow!("Could not locate model directory for {}", settings.model))
}
