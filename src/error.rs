//! Error taxonomy for the retrieval and answering pipeline.
//!
//! | Variant | Meaning | Pipeline reaction |
//! |---------|---------|-------------------|
//! | [`AshaError::Configuration`] | missing index and corpus, bad credentials, bad config | fail the request |
//! | [`AshaError::SourceUnavailable`] | one corpus file unreadable or unparseable | log, drop the file, continue |
//! | [`AshaError::Dependency`] | embedding or model service failure | retrieval degrades to no context; model call fails the request |
//! | [`AshaError::Storage`] | persisted index or feedback store failure | fail the operation |

use std::path::PathBuf;

use thiserror::Error;

/// Pipeline stage a dependency failure happened in. Carried in logs and
/// error messages so failures can be diagnosed without replaying them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    IndexBuild,
    Retrieval,
    ModelCall,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::IndexBuild => "index-build",
            Stage::Retrieval => "retrieval",
            Stage::ModelCall => "model-call",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum AshaError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("source unavailable: {}: {reason}", path.display())]
    SourceUnavailable { path: PathBuf, reason: String },

    #[error("{service} failed during {stage}: {source}")]
    Dependency {
        service: String,
        stage: Stage,
        #[source]
        source: anyhow::Error,
    },

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

impl AshaError {
    pub fn configuration(message: impl Into<String>) -> Self {
        AshaError::Configuration(message.into())
    }

    pub fn dependency(service: impl Into<String>, stage: Stage, source: anyhow::Error) -> Self {
        AshaError::Dependency {
            service: service.into(),
            stage,
            source,
        }
    }

    /// Re-tag a dependency failure with the stage the caller observed it in.
    /// Other variants pass through untouched.
    pub fn at_stage(self, stage: Stage) -> Self {
        match self {
            AshaError::Dependency {
                service, source, ..
            } => AshaError::Dependency {
                service,
                stage,
                source,
            },
            other => other,
        }
    }
}

pub type Result<T, E = AshaError> = std::result::Result<T, E>;
