//! The question-answering pipeline and the shared application context.
//!
//! One request runs one pipeline:
//!
//! ```text
//! ensure index ready ─▶ retrieve top-k ─▶ assemble prompt ─▶ model call ─▶ ids
//!        │ error            │ dependency error
//!        ▼                  ▼
//!   fail request      answer without context
//! ```
//!
//! [`AppContext`] is built once at startup and shared (behind an `Arc`) by
//! every request handler and CLI command.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::config::Config;
use crate::conversation::{Conversation, ExchangeIds};
use crate::corpus;
use crate::embedding::{self, Embedder};
use crate::error::{AshaError, Stage};
use crate::feedback::FeedbackStore;
use crate::index::KnowledgeBase;
use crate::llm::{self, ChatModel};
use crate::models::ConversationTurn;
use crate::prompt::{self, ContextType, HISTORY_WINDOW};
use crate::retrieve::Retriever;

fn default_context_type() -> String {
    "all".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub query: String,
    /// Prior turns held by the client, oldest first.
    #[serde(default)]
    pub chat_history: Vec<ConversationTurn>,
    #[serde(default = "default_context_type")]
    pub context_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    pub conversation_id: String,
    pub message_id: String,
    /// Reserved for a bias check; currently always `false`.
    pub is_biased: bool,
}

/// Browsable record collections backing the front end's tabs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingKind {
    Jobs,
    Events,
    Mentorship,
    Schemes,
}

impl ListingKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "jobs" => Some(ListingKind::Jobs),
            "events" => Some(ListingKind::Events),
            "mentorship" => Some(ListingKind::Mentorship),
            "schemes" => Some(ListingKind::Schemes),
            _ => None,
        }
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            ListingKind::Jobs => "job_listings.json",
            ListingKind::Events => "community_events.json",
            ListingKind::Mentorship => "mentorship_programs.json",
            ListingKind::Schemes => "governmentschemes.json",
        }
    }
}

/// Everything a request needs, built once at startup.
pub struct AppContext {
    pub config: Config,
    pub knowledge: KnowledgeBase,
    pub retriever: Retriever,
    pub model: Arc<dyn ChatModel>,
    pub feedback: FeedbackStore,
}

impl AppContext {
    /// Build providers from `config` and open the feedback store.
    pub async fn from_config(config: Config) -> Result<Self, AshaError> {
        let embedder = embedding::create_embedder(&config.embedding)?;
        let model = llm::create_model(&config.llm)?;
        Self::with_providers(config, embedder, model).await
    }

    /// Assemble a context around already-constructed providers.
    pub async fn with_providers(
        config: Config,
        embedder: Arc<dyn Embedder>,
        model: Arc<dyn ChatModel>,
    ) -> Result<Self, AshaError> {
        let feedback = FeedbackStore::open(&config.feedback.db_path).await?;
        Ok(Self {
            knowledge: KnowledgeBase::new(&config, embedder),
            retriever: Retriever::new(config.retrieval.k),
            model,
            feedback,
            config,
        })
    }

    /// Answer `query` within `conversation`, appending the exchange to it.
    ///
    /// `conversation` holds the turns preceding `query`.
    pub async fn respond(
        &self,
        conversation: &mut Conversation,
        query: &str,
        context_type: ContextType,
    ) -> Result<(String, ExchangeIds), AshaError> {
        tracing::info!(query, %context_type, "received query");

        self.knowledge.ensure_ready().await.map_err(|e| {
            tracing::error!(query, stage = %Stage::IndexBuild, error = %e, "index unavailable");
            e
        })?;

        let context = self.retriever.retrieve_or_empty(&self.knowledge, query).await?;
        tracing::info!(retrieved = context.len(), "retrieved context");

        let turns = prompt::assemble(
            query,
            &context,
            conversation.recent_window(HISTORY_WINDOW),
            context_type,
        );

        let answer = self.model.complete(&turns).await.map_err(|e| {
            tracing::error!(
                query,
                model = self.model.name(),
                stage = %Stage::ModelCall,
                error = %e,
                "model call failed"
            );
            e
        })?;

        conversation.append_user(query);
        conversation.append_assistant(answer.clone());
        Ok((answer, ExchangeIds::generate()))
    }

    /// Handle one stateless chat request.
    pub async fn answer(&self, request: ChatRequest) -> Result<ChatResponse, AshaError> {
        let context_type = ContextType::parse(&request.context_type);
        let mut conversation = Conversation::from_turns(request.chat_history);
        let (response, ids) = self
            .respond(&mut conversation, &request.query, context_type)
            .await?;

        Ok(ChatResponse {
            response,
            conversation_id: ids.conversation_id,
            message_id: ids.message_id,
            is_biased: false,
        })
    }

    /// Records of one listing file; empty when the file is absent.
    pub fn listings(&self, kind: ListingKind) -> Result<Vec<Value>, AshaError> {
        let path = self.config.corpus.root.join(kind.file_name());
        if !path.exists() {
            return Ok(Vec::new());
        }
        corpus::read_records(&path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let req: ChatRequest = serde_json::from_str(r#"{"query": "hello"}"#).unwrap();
        assert!(req.chat_history.is_empty());
        assert_eq!(req.context_type, "all");
    }

    #[test]
    fn test_listing_kinds() {
        assert_eq!(ListingKind::parse("jobs"), Some(ListingKind::Jobs));
        assert_eq!(
            ListingKind::parse("schemes").map(|k| k.file_name()),
            Some("governmentschemes.json")
        );
        assert_eq!(ListingKind::parse("recipes"), None);
    }
}
