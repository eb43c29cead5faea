//! Top-k retrieval over the knowledge base.
//!
//! [`Retriever::retrieve`] surfaces every error. The chat pipeline uses
//! [`Retriever::retrieve_or_empty`], which treats an embedding-service
//! outage as "no context" so the question is still answered.

use crate::error::AshaError;
use crate::index::KnowledgeBase;
use crate::models::RetrievedChunk;

/// Upper bound on chunks pulled into a single prompt.
pub const MAX_K: usize = 8;

/// Default number of chunks per query.
pub const DEFAULT_K: usize = 2;

#[derive(Debug, Clone, Copy)]
pub struct Retriever {
    k: usize,
}

impl Default for Retriever {
    fn default() -> Self {
        Self::new(DEFAULT_K)
    }
}

impl Retriever {
    /// `k` is clamped into `1..=MAX_K`.
    pub fn new(k: usize) -> Self {
        Self {
            k: k.clamp(1, MAX_K),
        }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub async fn retrieve(
        &self,
        knowledge: &KnowledgeBase,
        query: &str,
    ) -> Result<Vec<RetrievedChunk>, AshaError> {
        knowledge.query(query, self.k).await
    }

    /// Like [`retrieve`](Self::retrieve), but a dependency failure yields an
    /// empty result. Configuration and storage errors still propagate.
    pub async fn retrieve_or_empty(
        &self,
        knowledge: &KnowledgeBase,
        query: &str,
    ) -> Result<Vec<RetrievedChunk>, AshaError> {
        match self.retrieve(knowledge, query).await {
            Ok(chunks) => {
                if chunks.is_empty() {
                    tracing::warn!(query, "no relevant documents found; answering without context");
                }
                Ok(chunks)
            }
            Err(AshaError::Dependency {
                service,
                stage,
                source,
            }) => {
                tracing::warn!(
                    query,
                    %service,
                    %stage,
                    error = %source,
                    "retrieval failed; answering without context"
                );
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_k_is_clamped() {
        assert_eq!(Retriever::new(0).k(), 1);
        assert_eq!(Retriever::new(3).k(), 3);
        assert_eq!(Retriever::new(100).k(), MAX_K);
        assert_eq!(Retriever::default().k(), 2);
    }
}
