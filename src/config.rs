//! TOML configuration.
//!
//! Every section has defaults matching the stock deployment (corpus files in
//! the working directory, `./index_db` for the persisted index, Gemini for
//! answers, the Hugging Face Inference API for embeddings), so a missing
//! config file yields a runnable [`Config::minimal`].
//!
//! Credentials never live in the file; providers read them from the
//! environment when they are constructed.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::retrieve::MAX_K;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub feedback: FeedbackConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorpusConfig {
    /// Directory the corpus files live in.
    #[serde(default = "default_corpus_root")]
    pub root: PathBuf,
    /// Paginated document; each page becomes one unit.
    #[serde(default = "default_document")]
    pub document: String,
    #[serde(default = "default_record_files")]
    pub record_files: Vec<String>,
    #[serde(default = "default_text_files")]
    pub text_files: Vec<String>,
    /// Globs (relative to `root`) picking up additional free-text files.
    #[serde(default = "default_extra_text_globs")]
    pub extra_text_globs: Vec<String>,
    /// Write built-in sample files for any that are absent before loading.
    #[serde(default = "default_true")]
    pub seed_samples: bool,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            root: default_corpus_root(),
            document: default_document(),
            record_files: default_record_files(),
            text_files: default_text_files(),
            extra_text_globs: default_extra_text_globs(),
            seed_samples: true,
        }
    }
}

fn default_corpus_root() -> PathBuf {
    PathBuf::from(".")
}
fn default_document() -> String {
    "scheme.pdf".to_string()
}
fn default_record_files() -> Vec<String> {
    [
        "governmentschemes.json",
        "job_listings.json",
        "community_events.json",
        "mentorship_programs.json",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
fn default_text_files() -> Vec<String> {
    [
        "dairybusiness.txt",
        "tutoringbusiness.txt",
        "tailoringbusiness.txt",
        "careers_for_women.txt",
        "women_empowerment.txt",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
fn default_extra_text_globs() -> Vec<String> {
    vec!["*.txt".to_string()]
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    #[serde(default = "default_overlap_chars")]
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
            overlap_chars: default_overlap_chars(),
        }
    }
}

fn default_max_chars() -> usize {
    1000
}
fn default_overlap_chars() -> usize {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_k")]
    pub k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { k: default_k() }
    }
}

fn default_k() -> usize {
    2
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    /// Directory holding the persisted index. Present and non-empty means
    /// "load"; anything else means "build from the corpus".
    #[serde(default = "default_index_dir")]
    pub dir: PathBuf,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            dir: default_index_dir(),
        }
    }
}

fn default_index_dir() -> PathBuf {
    PathBuf::from("./index_db")
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    /// Base URL override (Ollama host, OpenAI-compatible gateway, HF endpoint).
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: 0,
            timeout_secs: default_embedding_timeout(),
        }
    }
}

fn default_embedding_provider() -> String {
    "huggingface".to_string()
}
fn default_batch_size() -> usize {
    32
}
fn default_embedding_timeout() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub max_output_tokens: Option<u32>,
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: default_llm_model(),
            url: None,
            temperature: None,
            max_output_tokens: None,
            timeout_secs: default_llm_timeout(),
        }
    }
}

fn default_llm_provider() -> String {
    "gemini".to_string()
}
fn default_llm_model() -> String {
    "gemini-2.0-flash".to_string()
}
fn default_llm_timeout() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8000".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct FeedbackConfig {
    #[serde(default = "default_feedback_db")]
    pub db_path: PathBuf,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            db_path: default_feedback_db(),
        }
    }
}

fn default_feedback_db() -> PathBuf {
    PathBuf::from("./data/feedback.sqlite")
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_log_file")]
    pub file_name: String,
    /// Fallback filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
            file_name: default_log_file(),
            filter: default_log_filter(),
        }
    }
}

fn default_log_dir() -> PathBuf {
    PathBuf::from(".")
}
fn default_log_file() -> String {
    "asha_chatbot.log".to_string()
}
fn default_log_filter() -> String {
    "info".to_string()
}

impl Config {
    /// All-defaults configuration, used when no config file exists.
    pub fn minimal() -> Self {
        Self::default()
    }
}

/// Load the config file at `path`, or [`Config::minimal`] if it does not
/// exist. The boolean reports whether a file was actually read.
pub fn load_or_default(path: &Path) -> Result<(Config, bool)> {
    if path.exists() {
        Ok((load_config(path)?, true))
    } else {
        let config = Config::minimal();
        validate(&config)?;
        Ok((config, false))
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.chunking.max_chars == 0 {
        anyhow::bail!("chunking.max_chars must be > 0");
    }
    if config.chunking.overlap_chars >= config.chunking.max_chars {
        anyhow::bail!(
            "chunking.overlap_chars ({}) must be < chunking.max_chars ({})",
            config.chunking.overlap_chars,
            config.chunking.max_chars
        );
    }

    if config.retrieval.k == 0 || config.retrieval.k > MAX_K {
        anyhow::bail!("retrieval.k must be in [1, {}]", MAX_K);
    }

    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }

    match config.embedding.provider.as_str() {
        "disabled" | "huggingface" | "local" => {}
        "openai" | "ollama" => {
            if config.embedding.model.is_none() {
                anyhow::bail!(
                    "embedding.model must be specified when provider is '{}'",
                    config.embedding.provider
                );
            }
        }
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, huggingface, openai, ollama, or local.",
            other
        ),
    }

    match config.llm.provider.as_str() {
        "gemini" | "openai" => {}
        other => anyhow::bail!(
            "Unknown llm provider: '{}'. Must be gemini or openai.",
            other
        ),
    }
    if config.llm.model.trim().is_empty() {
        anyhow::bail!("llm.model must not be empty");
    }

    Ok(())
}
