//! Chat model capability.
//!
//! [`ChatModel`] takes the assembled message list and returns the model's
//! answer text. Two remote providers:
//!
//! - **[`GeminiModel`]** — Google `generateContent` (default, `GEMINI_API_KEY`).
//! - **[`OpenAIChatModel`]** — any OpenAI-compatible `/chat/completions`
//!   endpoint (`OPENAI_API_KEY`).
//!
//! Failures surface as [`AshaError::Dependency`] tagged
//! [`Stage::ModelCall`]; the request fails rather than returning an error
//! string as if it were an answer.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::config::LlmConfig;
use crate::embedding::{build_client, post_json, require_env, Auth};
use crate::error::{AshaError, Stage};
use crate::models::{ConversationTurn, Role};

const DEFAULT_GEMINI_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";

#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Provider/model label used in logs and errors.
    fn name(&self) -> &str;

    /// Run one completion over `turns` and return the answer text.
    async fn complete(&self, turns: &[ConversationTurn]) -> Result<String, AshaError>;
}

fn model_error(service: &str, err: anyhow::Error) -> AshaError {
    AshaError::dependency(service, Stage::ModelCall, err)
}

// ============ Gemini ============

pub struct GeminiModel {
    client: reqwest::Client,
    label: String,
    endpoint: String,
    api_key: String,
    temperature: Option<f64>,
    max_output_tokens: Option<u32>,
}

impl GeminiModel {
    pub fn new(config: &LlmConfig) -> Result<Self, AshaError> {
        let api_key = require_env(&["GEMINI_API_KEY"])?;
        let base = config.url.as_deref().unwrap_or(DEFAULT_GEMINI_URL);
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            label: format!("gemini/{}", config.model),
            endpoint: format!(
                "{}/models/{}:generateContent",
                base.trim_end_matches('/'),
                config.model
            ),
            api_key,
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
        })
    }

    /// System turns become `systemInstruction`; assistant turns use the
    /// `model` role.
    fn request_body(&self, turns: &[ConversationTurn]) -> Value {
        let system: Vec<&str> = turns
            .iter()
            .filter(|t| t.role == Role::System)
            .map(|t| t.content.as_str())
            .collect();

        let contents: Vec<Value> = turns
            .iter()
            .filter(|t| t.role != Role::System)
            .map(|t| {
                let role = match t.role {
                    Role::Assistant => "model",
                    _ => "user",
                };
                json!({ "role": role, "parts": [{ "text": t.content }] })
            })
            .collect();

        let mut body = json!({ "contents": contents });
        if !system.is_empty() {
            body["systemInstruction"] = json!({ "parts": [{ "text": system.join("\n") }] });
        }

        let mut generation = serde_json::Map::new();
        if let Some(t) = self.temperature {
            generation.insert("temperature".to_string(), json!(t));
        }
        if let Some(n) = self.max_output_tokens {
            generation.insert("maxOutputTokens".to_string(), json!(n));
        }
        if !generation.is_empty() {
            body["generationConfig"] = Value::Object(generation);
        }
        body
    }
}

fn gemini_text(payload: &Value) -> Option<String> {
    let parts = payload
        .get("candidates")?
        .as_array()?
        .first()?
        .get("content")?
        .get("parts")?
        .as_array()?;
    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .collect();
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

#[async_trait]
impl ChatModel for GeminiModel {
    fn name(&self) -> &str {
        &self.label
    }

    async fn complete(&self, turns: &[ConversationTurn]) -> Result<String, AshaError> {
        let body = self.request_body(turns);
        let payload = post_json(
            &self.client,
            &self.endpoint,
            Auth::Header("x-goog-api-key", &self.api_key),
            &body,
            0,
            "Gemini",
        )
        .await
        .map_err(|e| model_error(&self.label, e))?;

        gemini_text(&payload).ok_or_else(|| {
            model_error(
                &self.label,
                anyhow::anyhow!("response did not include candidate text: {}", payload),
            )
        })
    }
}

// ============ OpenAI-compatible ============

pub struct OpenAIChatModel {
    client: reqwest::Client,
    label: String,
    model: String,
    endpoint: String,
    api_key: String,
    temperature: Option<f64>,
    max_output_tokens: Option<u32>,
}

impl OpenAIChatModel {
    pub fn new(config: &LlmConfig) -> Result<Self, AshaError> {
        let api_key = require_env(&["OPENAI_API_KEY"])?;
        let base = config.url.as_deref().unwrap_or(DEFAULT_OPENAI_URL);
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            label: format!("openai/{}", config.model),
            model: config.model.clone(),
            endpoint: format!("{}/chat/completions", base.trim_end_matches('/')),
            api_key,
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
        })
    }

    fn request_body(&self, turns: &[ConversationTurn]) -> Value {
        let messages: Vec<Value> = turns
            .iter()
            .map(|t| json!({ "role": t.role.as_str(), "content": t.content }))
            .collect();

        let mut body = json!({ "model": self.model, "messages": messages });
        if let Some(t) = self.temperature {
            body["temperature"] = json!(t);
        }
        if let Some(n) = self.max_output_tokens {
            body["max_tokens"] = json!(n);
        }
        body
    }
}

fn openai_text(payload: &Value) -> Option<String> {
    payload
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(Value::as_str)
        .filter(|value| !value.trim().is_empty())
        .map(ToOwned::to_owned)
}

#[async_trait]
impl ChatModel for OpenAIChatModel {
    fn name(&self) -> &str {
        &self.label
    }

    async fn complete(&self, turns: &[ConversationTurn]) -> Result<String, AshaError> {
        let body = self.request_body(turns);
        let payload = post_json(
            &self.client,
            &self.endpoint,
            Auth::Bearer(&self.api_key),
            &body,
            0,
            "OpenAI",
        )
        .await
        .map_err(|e| model_error(&self.label, e))?;

        openai_text(&payload).ok_or_else(|| {
            model_error(
                &self.label,
                anyhow::anyhow!("response did not include assistant content: {}", payload),
            )
        })
    }
}

/// Create the chat model named by `config.provider`.
pub fn create_model(config: &LlmConfig) -> Result<Arc<dyn ChatModel>, AshaError> {
    match config.provider.as_str() {
        "gemini" => Ok(Arc::new(GeminiModel::new(config)?)),
        "openai" => Ok(Arc::new(OpenAIChatModel::new(config)?)),
        other => Err(AshaError::configuration(format!(
            "unknown llm provider: {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gemini() -> GeminiModel {
        GeminiModel {
            client: reqwest::Client::new(),
            label: "gemini/test".to_string(),
            endpoint: String::new(),
            api_key: String::new(),
            temperature: Some(0.2),
            max_output_tokens: None,
        }
    }

    #[test]
    fn test_gemini_body_maps_roles() {
        let turns = vec![
            ConversationTurn::system("persona"),
            ConversationTurn::user("hi"),
            ConversationTurn::assistant("hello"),
            ConversationTurn::user("jobs?"),
        ];
        let body = gemini().request_body(&turns);

        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "persona");
        let contents = body["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(contents[2]["parts"][0]["text"], "jobs?");
        assert_eq!(body["generationConfig"]["temperature"], 0.2);
    }

    #[test]
    fn test_response_text_extraction() {
        let gemini_payload = json!({
            "candidates": [{ "content": { "parts": [{ "text": "Namaste" }, { "text": "!" }] } }]
        });
        assert_eq!(gemini_text(&gemini_payload).as_deref(), Some("Namaste!"));
        assert!(gemini_text(&json!({ "candidates": [] })).is_none());

        let openai_payload = json!({ "choices": [{ "message": { "content": "Hello" } }] });
        assert_eq!(openai_text(&openai_payload).as_deref(), Some("Hello"));
        assert!(openai_text(&json!({ "choices": [{ "message": { "content": "  " } }] })).is_none());
    }

    #[test]
    fn test_unknown_provider_is_configuration_error() {
        let config = LlmConfig {
            provider: "palm".to_string(),
            ..LlmConfig::default()
        };
        assert!(matches!(
            create_model(&config),
            Err(AshaError::Configuration(_))
        ));
    }
}
