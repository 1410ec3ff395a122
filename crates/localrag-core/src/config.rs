//! Lightweight configuration loader and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (nested keys separated by `__`, e.g. `APP_RETRIEVAL__DEFAULT_K=8`).
//! Provides helpers to expand `~` and `${VAR}` and to resolve relative paths
//! against a known base directory.
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::data_processor::ChunkingConfig;
use crate::error::Error;
use crate::options::RedundancyPenalties;

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let cwd = env::current_dir()?;
        Self::load_in(&cwd)
    }

    /// Same as [`Config::load`] but looks for the TOML files under `base`.
    pub fn load_in(base: &Path) -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file(base.join("config.toml")));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file(base.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(base.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(base.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.validate()?;
        Ok(config)
    }

    /// Typed view of the whole configuration; absent keys take defaults.
    pub fn settings(&self) -> crate::Result<RagSettings> {
        self.figment
            .extract::<RagSettings>()
            .map_err(|e| Error::configuration(format!("failed to read settings: {e}")))
    }

    fn validate(&self) -> anyhow::Result<()> {
        let settings = self.settings()?;
        settings.retrieval.penalties.validate()?;
        if settings.prompt.chars_per_token == 0 {
            anyhow::bail!("prompt.chars_per_token must be at least 1");
        }
        if settings.chunking.chunk_size == 0 {
            anyhow::bail!("chunking.chunk_size must be at least 1");
        }
        Ok(())
    }
}

/// Everything the retrieval stack reads from configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RagSettings {
    pub retrieval: RetrievalSettings,
    pub prompt: PromptSettings,
    pub chunking: ChunkingConfig,
    pub embedding: EmbeddingSettings,
    pub data: DataSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub default_k: usize,
    pub fetch_pool_multiplier: usize,
    pub fetch_pool_floor: usize,
    pub lambda: f32,
    pub penalties: RedundancyPenalties,
    pub embedding_timeout_ms: u64,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            default_k: 5,
            fetch_pool_multiplier: 4,
            fetch_pool_floor: 40,
            lambda: 0.7,
            penalties: RedundancyPenalties::default(),
            embedding_timeout_ms: 30_000,
        }
    }
}

impl RetrievalSettings {
    /// `max(multiplier * k, floor)`.
    pub fn default_pool_size(&self, k: usize) -> usize {
        k.saturating_mul(self.fetch_pool_multiplier).max(self.fetch_pool_floor).max(k)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptSettings {
    pub max_tokens: usize,
    pub chars_per_token: usize,
    pub header: String,
    pub footer: Option<String>,
}

impl Default for PromptSettings {
    fn default() -> Self {
        Self {
            max_tokens: 1024,
            chars_per_token: 4,
            header: "Use the following passages to answer the question. Cite passages by their title.".to_string(),
            footer: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingMode {
    #[default]
    Lexical,
    Dense,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub mode: EmbeddingMode,
    pub model: String,
    pub model_dir: Option<String>,
    pub max_len: usize,
    pub batch_size: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            mode: EmbeddingMode::Lexical,
            model: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            model_dir: None,
            max_len: 256,
            batch_size: 64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    pub corpus_dir: String,
    pub artifact_dir: String,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self { corpus_dir: "data".to_string(), artifact_dir: "rag".to_string() }
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    // Expand env vars first
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    // Expand ~ at start
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
