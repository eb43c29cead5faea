//! User feedback on answers.
//!
//! Each submission is stored verbatim in SQLite. The known feedback types
//! are `helpful`, `not_helpful` and `reported`; anything else is accepted
//! too and logged at warn level.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use std::path::Path;

use crate::db;
use crate::error::AshaError;

pub const KNOWN_FEEDBACK_TYPES: &[&str] = &["helpful", "not_helpful", "reported"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackRequest {
    pub conversation_id: String,
    pub message_id: String,
    pub feedback_type: String,
    #[serde(default)]
    pub details: Option<String>,
}

/// A stored feedback row.
#[derive(Debug, Clone, Serialize)]
pub struct FeedbackRecord {
    pub conversation_id: String,
    pub message_id: String,
    pub feedback_type: String,
    pub details: Option<String>,
    pub created_at: String,
}

#[derive(Clone)]
pub struct FeedbackStore {
    pool: SqlitePool,
}

impl FeedbackStore {
    /// Open (creating if needed) the feedback database at `db_path`.
    pub async fn open(db_path: &Path) -> Result<Self, AshaError> {
        let pool = db::connect(db_path).await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS feedback (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                conversation_id TEXT NOT NULL,
                message_id TEXT NOT NULL,
                feedback_type TEXT NOT NULL,
                details TEXT,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_feedback_message ON feedback(message_id)")
            .execute(&pool)
            .await?;

        Ok(Self { pool })
    }

    pub async fn record(&self, feedback: &FeedbackRequest) -> Result<(), AshaError> {
        if !KNOWN_FEEDBACK_TYPES.contains(&feedback.feedback_type.as_str()) {
            tracing::warn!(
                feedback_type = %feedback.feedback_type,
                message_id = %feedback.message_id,
                "unrecognized feedback type; storing as-is"
            );
        }

        sqlx::query(
            "INSERT INTO feedback (conversation_id, message_id, feedback_type, details, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&feedback.conversation_id)
        .bind(&feedback.message_id)
        .bind(&feedback.feedback_type)
        .bind(&feedback.details)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        tracing::info!(
            feedback_type = %feedback.feedback_type,
            conversation_id = %feedback.conversation_id,
            message_id = %feedback.message_id,
            "feedback recorded"
        );
        Ok(())
    }

    /// Feedback rows for one message, oldest first.
    pub async fn for_message(&self, message_id: &str) -> Result<Vec<FeedbackRecord>, AshaError> {
        let rows = sqlx::query(
            "SELECT conversation_id, message_id, feedback_type, details, created_at \
             FROM feedback WHERE message_id = ? ORDER BY id",
        )
        .bind(message_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| FeedbackRecord {
                conversation_id: row.get("conversation_id"),
                message_id: row.get("message_id"),
                feedback_type: row.get("feedback_type"),
                details: row.get("details"),
                created_at: row.get("created_at"),
            })
            .collect())
    }

    pub async fn count(&self) -> Result<i64, AshaError> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM feedback")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }
}
