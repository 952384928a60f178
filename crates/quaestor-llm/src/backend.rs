//! LLM backend trait and the Gemini implementation.
//!
//! The service only needs Gemini (`generateContent`), but the trait keeps
//! the seam open for other hosted providers. Structured analyses use
//! Gemini's JSON response mode (`responseMimeType` + `responseSchema`).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use quaestor_common::sandbox::SandboxClient;

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("API error [{status}]: {message}")]
    Api { status: u16, message: String },
    #[error("Request blocked: {0}")]
    Blocked(String),
}

// ── Request / Response ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String, // "system" | "user"
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRequest {
    pub messages: Vec<Message>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl LlmRequest {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            messages: vec![Message {
                role: "user".to_string(),
                content: content.into(),
            }],
            max_tokens: None,
            temperature: None,
        }
    }

    pub fn with_system(mut self, content: impl Into<String>) -> Self {
        self.messages.insert(
            0,
            Message {
                role: "system".to_string(),
                content: content.into(),
            },
        );
        self
    }
}

// ── Trait ─────────────────────────────────────────────────────────────────────

#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Plain-text completion.
    async fn complete(&self, req: LlmRequest) -> Result<String, LlmError>;

    /// Completion constrained to a JSON schema; returns the parsed value.
    async fn complete_structured(&self, req: LlmRequest, schema: Value) -> Result<Value, LlmError>;

    fn model_id(&self) -> &str;
}

async fn check_response_status(resp: reqwest::Response) -> Result<Value, LlmError> {
    let status = resp.status().as_u16();
    let body: Value = resp.json().await?;
    if status >= 400 {
        let msg = body["error"]["message"]
            .as_str()
            .or_else(|| body["message"].as_str())
            .unwrap_or("unknown API error")
            .to_string();
        return Err(LlmError::Api {
            status,
            message: msg,
        });
    }
    Ok(body)
}

// ── Gemini ────────────────────────────────────────────────────────────────────

pub struct GeminiBackend {
    pub model: String,
    api_key: String,
    client: SandboxClient,
}

impl GeminiBackend {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> anyhow::Result<Self> {
        Ok(Self {
            api_key: api_key.into(),
            model: model.into(),
            client: SandboxClient::new()?,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            self.model, self.api_key
        )
    }

    fn build_body(&self, req: &LlmRequest, schema: Option<&Value>) -> Value {
        // System message → systemInstruction, everything else → contents.
        let system_text = req
            .messages
            .iter()
            .find(|m| m.role == "system")
            .map(|m| m.content.clone());

        let contents: Vec<Value> = req
            .messages
            .iter()
            .filter(|m| m.role != "system")
            .map(|m| {
                serde_json::json!({
                    "role": "user",
                    "parts": [{ "text": m.content }]
                })
            })
            .collect();

        let mut generation_config = serde_json::json!({
            "maxOutputTokens": req.max_tokens.unwrap_or(1024),
            "temperature": req.temperature.unwrap_or(0.2),
        });
        if let Some(schema) = schema {
            generation_config["responseMimeType"] = Value::String("application/json".into());
            generation_config["responseSchema"] = schema.clone();
        }

        let mut body = serde_json::json!({
            "contents": contents,
            "generationConfig": generation_config,
        });
        if let Some(sys) = system_text {
            body["systemInstruction"] = serde_json::json!({ "parts": [{ "text": sys }] });
        }
        body
    }

    async fn generate(&self, body: Value) -> Result<String, LlmError> {
        let resp = self
            .client
            .post(&self.endpoint())
            .map_err(|e| LlmError::Blocked(e.to_string()))?
            .json(&body)
            .send()
            .await?;
        let json = check_response_status(resp).await?;
        Ok(json["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .unwrap_or("")
            .to_string())
    }
}

#[async_trait]
impl LlmBackend for GeminiBackend {
    async fn complete(&self, req: LlmRequest) -> Result<String, LlmError> {
        let body = self.build_body(&req, None);
        self.generate(body).await
    }

    async fn complete_structured(&self, req: LlmRequest, schema: Value) -> Result<Value, LlmError> {
        let body = self.build_body(&req, Some(&schema));
        let text = self.generate(body).await?;
        Ok(serde_json::from_str(&text)?)
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}
