#![allow(dead_code)]

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use asha::config::Config;
use asha::embedding::Embedder;
use asha::error::{AshaError, Stage};
use asha::llm::ChatModel;
use asha::models::ConversationTurn;

const DIMS: usize = 64;

/// Bag-of-words embedder: texts sharing words land close together.
pub struct FakeEmbedder {
    model: String,
    failing: AtomicBool,
    embedded: AtomicUsize,
}

impl FakeEmbedder {
    pub fn new(model: &str) -> Arc<Self> {
        Arc::new(Self {
            model: model.to_string(),
            failing: AtomicBool::new(false),
            embedded: AtomicUsize::new(0),
        })
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Total number of texts embedded so far.
    pub fn embedded(&self) -> usize {
        self.embedded.load(Ordering::SeqCst)
    }
}

fn bag_of_words(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; DIMS];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let slot = word
            .to_lowercase()
            .bytes()
            .fold(7usize, |h, b| h.wrapping_mul(31).wrapping_add(b as usize))
            % DIMS;
        v[slot] += 1.0;
    }
    v
}

#[async_trait]
impl Embedder for FakeEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AshaError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AshaError::dependency(
                "fake-embedder",
                Stage::IndexBuild,
                anyhow::anyhow!("embedding service unreachable"),
            ));
        }
        self.embedded.fetch_add(texts.len(), Ordering::SeqCst);
        Ok(texts.iter().map(|t| bag_of_words(t)).collect())
    }
}

/// Chat model that records every prompt it receives.
pub struct FakeModel {
    reply: String,
    failing: AtomicBool,
    prompts: Mutex<Vec<Vec<ConversationTurn>>>,
}

impl FakeModel {
    pub fn new(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            failing: AtomicBool::new(false),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn last_prompt(&self) -> Vec<ConversationTurn> {
        self.prompts.lock().unwrap().last().cloned().unwrap_or_default()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatModel for FakeModel {
    fn name(&self) -> &str {
        "fake-model"
    }

    async fn complete(&self, turns: &[ConversationTurn]) -> Result<String, AshaError> {
        self.prompts.lock().unwrap().push(turns.to_vec());
        if self.failing.load(Ordering::SeqCst) {
            return Err(AshaError::dependency(
                "fake-model",
                Stage::ModelCall,
                anyhow::anyhow!("quota exceeded"),
            ));
        }
        Ok(self.reply.clone())
    }
}

/// Config rooted in `root` whose corpus is exactly `text_files`.
pub fn test_config(root: &Path, text_files: &[&str]) -> Config {
    let mut cfg = Config::minimal();
    cfg.corpus.root = root.join("corpus");
    cfg.corpus.seed_samples = false;
    cfg.corpus.record_files = Vec::new();
    cfg.corpus.text_files = text_files.iter().map(|s| s.to_string()).collect();
    cfg.corpus.extra_text_globs = Vec::new();
    cfg.index.dir = root.join("index_db");
    cfg.feedback.db_path = root.join("data/feedback.sqlite");
    cfg.retrieval.k = 2;
    cfg
}

pub fn write_corpus_file(root: &Path, name: &str, content: &str) {
    let dir = root.join("corpus");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(name), content).unwrap();
}

/// A one-page PDF whose page draws text with `/F1` but defines no fonts in
/// its resources. pdf-extract cannot handle it.
pub fn pdf_with_undefined_font() -> Vec<u8> {
    let content = "BT /F1 12 Tf (Hello) Tj ET";
    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Resources << >> /Contents 4 0 R >>"
            .to_string(),
        format!("<< /Length {} >>\nstream\n{}\nendstream", content.len(), content),
    ];

    let mut pdf = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::new();
    for (i, body) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
    }
    let xref_at = pdf.len();
    pdf.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes());
    for off in offsets {
        pdf.extend_from_slice(format!("{:010} 00000 n \n", off).as_bytes());
    }
    pdf.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_at
        )
        .as_bytes(),
    );
    pdf
}
