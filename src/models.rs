//! Core data models used throughout the pipeline.
//!
//! These types represent the corpus units, chunks, retrieval results and
//! conversation turns that flow from ingestion through to the model call.

use serde::{Deserialize, Serialize};

/// One normalized piece of the corpus: a PDF page, a JSON record, or a
/// whole text file, tagged with the file it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUnit {
    pub text: String,
    /// File name the unit was read from (e.g. `job_listings.json`).
    pub origin: String,
}

impl SourceUnit {
    pub fn new(text: impl Into<String>, origin: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            origin: origin.into(),
        }
    }
}

/// A bounded window of a [`SourceUnit`]'s text; the unit that is embedded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Content-addressed key (SHA-256 of origin, unit, seq and text).
    pub id: String,
    pub origin: String,
    /// Position of the parent unit in the loaded corpus.
    pub unit: i64,
    /// Position of this chunk within its unit, contiguous from 0.
    pub seq: i64,
    pub text: String,
    /// SHA-256 of `text` alone.
    pub hash: String,
}

/// A chunk returned by a similarity query together with its score.
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub chunk: Chunk,
    /// Cosine similarity in `[-1.0, 1.0]`.
    pub score: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One role-tagged chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}
