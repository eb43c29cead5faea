//! Embedding capability abstraction and implementations.
//!
//! Defines the [`Embedder`] trait and concrete implementations:
//! - **[`DisabledEmbedder`]** — returns errors; used when embeddings are not configured.
//! - **[`HuggingFaceEmbedder`]** — calls the Hugging Face Inference API feature-extraction pipeline.
//! - **[`OpenAIEmbedder`]** — calls the OpenAI embeddings API (or any compatible gateway).
//! - **[`OllamaEmbedder`]** — calls a local Ollama instance's `/api/embed` endpoint.
//! - **`LocalEmbedder`** — runs fastembed in-process (feature `local-embeddings`).
//!
//! Also provides vector utilities used by the index:
//! - [`cosine_similarity`] — similarity between two embedding vectors
//! - [`vec_to_blob`] / [`blob_to_vec`] — little-endian `f32` BLOB encoding for SQLite
//!
//! # Failure policy
//!
//! Every remote failure surfaces as [`AshaError::Dependency`] with the
//! underlying cause attached. Missing credentials surface as
//! [`AshaError::Configuration`] when the embedder is created, never at
//! request time. Requests are attempted once unless `embedding.max_retries`
//! is raised; retries back off exponentially (1s, 2s, 4s, … capped at 32s)
//! on HTTP 429, 5xx and network errors only.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::EmbeddingConfig;
use crate::error::{AshaError, Stage};

const DEFAULT_HF_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";
const DEFAULT_HF_URL: &str = "https://router.huggingface.co/hf-inference/models";
const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";
const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// A text embedding capability.
///
/// Implementations return one vector per input text, in input order. The
/// same embedder must be used to build an index and to query it.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model identifier, persisted with the index to detect model changes.
    fn model_name(&self) -> &str;

    /// Embed a batch of texts.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AshaError>;
}

/// Embed a single query text.
pub async fn embed_query(embedder: &dyn Embedder, text: &str) -> Result<Vec<f32>, AshaError> {
    let results = embedder.embed(&[text.to_string()]).await?;
    results.into_iter().next().ok_or_else(|| {
        AshaError::dependency(
            embedder.model_name(),
            Stage::Retrieval,
            anyhow::anyhow!("empty embedding response"),
        )
    })
}

/// Embed `texts` in batches of `batch_size`, checking that every batch
/// returns exactly one vector per input.
pub async fn embed_batched(
    embedder: &dyn Embedder,
    texts: &[String],
    batch_size: usize,
) -> Result<Vec<Vec<f32>>, AshaError> {
    let mut vectors = Vec::with_capacity(texts.len());
    for batch in texts.chunks(batch_size.max(1)) {
        let embedded = embedder.embed(batch).await?;
        if embedded.len() != batch.len() {
            return Err(AshaError::dependency(
                embedder.model_name(),
                Stage::IndexBuild,
                anyhow::anyhow!(
                    "embedding count mismatch: sent {}, received {}",
                    batch.len(),
                    embedded.len()
                ),
            ));
        }
        vectors.extend(embedded);
    }
    Ok(vectors)
}

// ============ Disabled ============

/// An embedder that always fails; used when `embedding.provider = "disabled"`.
pub struct DisabledEmbedder;

#[async_trait]
impl Embedder for DisabledEmbedder {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, AshaError> {
        Err(AshaError::configuration(
            "embedding provider is disabled; set [embedding] provider in config",
        ))
    }
}

// ============ Shared HTTP plumbing ============

pub(crate) fn build_client(timeout_secs: u64) -> Result<reqwest::Client, AshaError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| AshaError::configuration(format!("failed to build HTTP client: {}", e)))
}

pub(crate) fn require_env(names: &[&str]) -> Result<String, AshaError> {
    names
        .iter()
        .find_map(|name| std::env::var(name).ok().filter(|v| !v.trim().is_empty()))
        .ok_or_else(|| {
            AshaError::configuration(format!(
                "{} environment variable not set",
                names.join(" or ")
            ))
        })
}

/// How a remote request authenticates.
#[derive(Clone, Copy)]
pub(crate) enum Auth<'a> {
    None,
    Bearer(&'a str),
    Header(&'static str, &'a str),
}

/// POST `body` to `url`, retrying transient failures up to `max_retries`
/// times. Returns the parsed JSON response.
pub(crate) async fn post_json(
    client: &reqwest::Client,
    url: &str,
    auth: Auth<'_>,
    body: &serde_json::Value,
    max_retries: u32,
    service: &str,
) -> anyhow::Result<serde_json::Value> {
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tokio::time::sleep(delay).await;
        }

        let mut req = client.post(url).json(body);
        match auth {
            Auth::None => {}
            Auth::Bearer(token) => req = req.bearer_auth(token),
            Auth::Header(name, value) => req = req.header(name, value),
        }

        match req.send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return Ok(response.json().await?);
                }

                // Rate limited or server error — retry
                if status.as_u16() == 429 || status.is_server_error() {
                    let body_text = response.text().await.unwrap_or_default();
                    last_err = Some(anyhow::anyhow!(
                        "{} API error {}: {}",
                        service,
                        status,
                        body_text
                    ));
                    continue;
                }

                let body_text = response.text().await.unwrap_or_default();
                anyhow::bail!("{} API error {}: {}", service, status, body_text);
            }
            Err(e) => {
                last_err = Some(anyhow::anyhow!("{} request failed: {}", service, e.without_url()));
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("{} failed after retries", service)))
}

fn as_f32_vec(value: &serde_json::Value) -> Option<Vec<f32>> {
    value
        .as_array()?
        .iter()
        .map(|v| v.as_f64().map(|f| f as f32))
        .collect()
}

// ============ Hugging Face ============

/// Embedder backed by the Hugging Face Inference API.
///
/// Calls `POST {url}/{model}/pipeline/feature-extraction`. Requires
/// `HUGGINGFACE_HUB_API_TOKEN` (or `HF_TOKEN`) in the environment.
pub struct HuggingFaceEmbedder {
    client: reqwest::Client,
    model: String,
    url: String,
    token: String,
    max_retries: u32,
}

impl HuggingFaceEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, AshaError> {
        let token = require_env(&["HUGGINGFACE_HUB_API_TOKEN", "HF_TOKEN"])?;
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            model: config
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_HF_MODEL.to_string()),
            url: config
                .url
                .clone()
                .unwrap_or_else(|| DEFAULT_HF_URL.to_string()),
            token,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl Embedder for HuggingFaceEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AshaError> {
        let url = format!(
            "{}/{}/pipeline/feature-extraction",
            self.url.trim_end_matches('/'),
            self.model
        );
        let body = serde_json::json!({
            "inputs": texts,
            "options": { "wait_for_model": true },
        });
        post_json(
            &self.client,
            &url,
            Auth::Bearer(&self.token),
            &body,
            self.max_retries,
            "Hugging Face",
        )
        .await
        .and_then(|json| parse_feature_extraction(&json))
        .map_err(|e| AshaError::dependency("huggingface", Stage::IndexBuild, e))
    }
}

/// Parse a feature-extraction response.
///
/// Sentence-transformer models return one pooled vector per input. Models
/// without a pooling head return one vector per token; those are
/// mean-pooled here.
fn parse_feature_extraction(json: &serde_json::Value) -> anyhow::Result<Vec<Vec<f32>>> {
    let items = json
        .as_array()
        .ok_or_else(|| anyhow::anyhow!("Invalid feature-extraction response: not an array"))?;

    items
        .iter()
        .map(|item| {
            if let Some(vec) = as_f32_vec(item) {
                return Ok(vec);
            }
            let tokens: Vec<Vec<f32>> = item
                .as_array()
                .ok_or_else(|| anyhow::anyhow!("Invalid feature-extraction response: item is not an array"))?
                .iter()
                .map(|t| {
                    as_f32_vec(t).ok_or_else(|| {
                        anyhow::anyhow!("Invalid feature-extraction response: token is not a vector")
                    })
                })
                .collect::<anyhow::Result<_>>()?;
            Ok(mean_pool(&tokens))
        })
        .collect()
}

fn mean_pool(tokens: &[Vec<f32>]) -> Vec<f32> {
    let Some(first) = tokens.first() else {
        return Vec::new();
    };
    let mut sum = vec![0.0f32; first.len()];
    for token in tokens {
        for (acc, v) in sum.iter_mut().zip(token) {
            *acc += v;
        }
    }
    let n = tokens.len() as f32;
    sum.into_iter().map(|v| v / n).collect()
}

// ============ OpenAI ============

/// Embedder using the OpenAI `POST /v1/embeddings` endpoint.
///
/// Requires `OPENAI_API_KEY`. `embedding.url` points it at any
/// OpenAI-compatible gateway.
pub struct OpenAIEmbedder {
    client: reqwest::Client,
    model: String,
    url: String,
    api_key: String,
    max_retries: u32,
}

impl OpenAIEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, AshaError> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| AshaError::configuration("embedding.model required for OpenAI provider"))?;
        let api_key = require_env(&["OPENAI_API_KEY"])?;
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            model,
            url: config
                .url
                .clone()
                .unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string()),
            api_key,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AshaError> {
        let url = format!("{}/embeddings", self.url.trim_end_matches('/'));
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        post_json(
            &self.client,
            &url,
            Auth::Bearer(&self.api_key),
            &body,
            self.max_retries,
            "OpenAI",
        )
        .await
        .and_then(|json| parse_openai_response(&json))
        .map_err(|e| AshaError::dependency("openai", Stage::IndexBuild, e))
    }
}

/// Extract `data[].embedding`, ordered by each item's `index`.
fn parse_openai_response(json: &serde_json::Value) -> anyhow::Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing data array"))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (pos, item) in data.iter().enumerate() {
        let embedding = item
            .get("embedding")
            .and_then(as_f32_vec)
            .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing embedding"))?;
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(pos);
        indexed.push((index, embedding));
    }
    indexed.sort_by_key(|(i, _)| *i);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

// ============ Ollama ============

/// Embedder using a local Ollama instance (`POST /api/embed`).
pub struct OllamaEmbedder {
    client: reqwest::Client,
    model: String,
    url: String,
    max_retries: u32,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, AshaError> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| AshaError::configuration("embedding.model required for Ollama provider"))?;
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            model,
            url: config
                .url
                .clone()
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AshaError> {
        let url = format!("{}/api/embed", self.url.trim_end_matches('/'));
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        post_json(&self.client, &url, Auth::None, &body, self.max_retries, "Ollama")
            .await
            .and_then(|json| parse_ollama_response(&json))
            .map_err(|e| AshaError::dependency("ollama", Stage::IndexBuild, e))
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> anyhow::Result<Vec<Vec<f32>>> {
    json.get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: missing embeddings array"))?
        .iter()
        .map(|e| {
            as_f32_vec(e)
                .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: embedding is not an array"))
        })
        .collect()
}

// ============ Local (fastembed) ============

/// In-process embedder. The model is downloaded from Hugging Face on first
/// use and cached; afterwards no network calls are made.
#[cfg(feature = "local-embeddings")]
pub struct LocalEmbedder {
    model_name: String,
    batch_size: usize,
}

#[cfg(feature = "local-embeddings")]
impl LocalEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, AshaError> {
        let model_name = config
            .model
            .clone()
            .unwrap_or_else(|| "all-minilm-l6-v2".to_string());
        config_to_fastembed_model(&model_name)?;
        Ok(Self {
            model_name,
            batch_size: config.batch_size,
        })
    }
}

#[cfg(feature = "local-embeddings")]
fn config_to_fastembed_model(name: &str) -> Result<fastembed::EmbeddingModel, AshaError> {
    match name {
        "all-minilm-l6-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
        "bge-small-en-v1.5" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
        other => Err(AshaError::configuration(format!(
            "Unknown local embedding model: '{}'. Supported models: \
             all-minilm-l6-v2, bge-small-en-v1.5, bge-base-en-v1.5",
            other
        ))),
    }
}

#[cfg(feature = "local-embeddings")]
#[async_trait]
impl Embedder for LocalEmbedder {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AshaError> {
        let fastembed_model = config_to_fastembed_model(&self.model_name)?;
        let batch_size = self.batch_size;
        let texts = texts.to_vec();

        tokio::task::spawn_blocking(move || {
            let mut model = fastembed::TextEmbedding::try_new(
                fastembed::InitOptions::new(fastembed_model).with_show_download_progress(false),
            )
            .map_err(|e| anyhow::anyhow!("Failed to initialize local embedding model: {}", e))?;

            model
                .embed(texts, Some(batch_size))
                .map_err(|e| anyhow::anyhow!("Local embedding failed: {}", e))
        })
        .await
        .map_err(anyhow::Error::from)
        .and_then(|r| r)
        .map_err(|e| AshaError::dependency("local", Stage::IndexBuild, e))
    }
}

/// Create the [`Embedder`] selected by `embedding.provider`.
///
/// | Config Value | Embedder |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledEmbedder`] |
/// | `"huggingface"` | [`HuggingFaceEmbedder`] |
/// | `"openai"` | [`OpenAIEmbedder`] |
/// | `"ollama"` | [`OllamaEmbedder`] |
/// | `"local"` | `LocalEmbedder` (feature `local-embeddings`) |
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>, AshaError> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledEmbedder)),
        "huggingface" => Ok(Arc::new(HuggingFaceEmbedder::new(config)?)),
        "openai" => Ok(Arc::new(OpenAIEmbedder::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaEmbedder::new(config)?)),
        #[cfg(feature = "local-embeddings")]
        "local" => Ok(Arc::new(LocalEmbedder::new(config)?)),
        #[cfg(not(feature = "local-embeddings"))]
        "local" => Err(AshaError::configuration(
            "Local embedding provider requires --features local-embeddings",
        )),
        other => Err(AshaError::configuration(format!(
            "Unknown embedding provider: {}",
            other
        ))),
    }
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// ```rust
/// use asha::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12);
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB written by [`vec_to_blob`].
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity in `[-1.0, 1.0]`; `0.0` for empty vectors, vectors of
/// different lengths, or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_blob_roundtrip() {
        let vec = vec![1.0f32, -2.5, 3.125, 0.0, -0.001];
        assert_eq!(blob_to_vec(&vec_to_blob(&vec)), vec);
    }

    #[test]
    fn test_cosine_identical_and_orthogonal() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_parse_pooled_feature_extraction() {
        let json = serde_json::json!([[0.1, 0.2], [0.3, 0.4]]);
        let out = parse_feature_extraction(&json).unwrap();
        assert_eq!(out.len(), 2);
        assert!((out[1][0] - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_parse_token_level_feature_extraction_mean_pools() {
        let json = serde_json::json!([[[1.0, 3.0], [3.0, 5.0]]]);
        let out = parse_feature_extraction(&json).unwrap();
        assert_eq!(out, vec![vec![2.0, 4.0]]);
    }

    #[test]
    fn test_parse_openai_orders_by_index() {
        let json = serde_json::json!({
            "data": [
                { "index": 1, "embedding": [2.0] },
                { "index": 0, "embedding": [1.0] }
            ]
        });
        assert_eq!(parse_openai_response(&json).unwrap(), vec![vec![1.0], vec![2.0]]);
    }

    #[test]
    fn test_parse_ollama_missing_field() {
        assert!(parse_ollama_response(&serde_json::json!({})).is_err());
    }

    #[test]
    fn test_unknown_provider_is_configuration_error() {
        let config = EmbeddingConfig {
            provider: "telepathy".to_string(),
            ..EmbeddingConfig::default()
        };
        assert!(matches!(
            create_embedder(&config),
            Err(AshaError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_disabled_embedder_errors() {
        let config = EmbeddingConfig {
            provider: "disabled".to_string(),
            ..EmbeddingConfig::default()
        };
        let embedder = create_embedder(&config).unwrap();
        assert!(embedder.embed(&["x".to_string()]).await.is_err());
    }
}
