//! HTTP transport for hosted language models
//!
//! Speaks two wire formats:
//!
//! ```text
//! gemini:      POST {endpoint}?key=KEY  {"contents":[{"parts":[{"text":PROMPT}]}], ...}
//!              answer at candidates[0].content.parts[0].text
//! openai-chat: POST {endpoint}  Authorization: Bearer KEY  {"model":..,"messages":[..], ...}
//!              answer at choices[0].message.content
//! ```

use crate::config::{ApiFlavor, Credential, ProviderConfig};
use crate::prompt::{combined_prompt, user_prompt, SYSTEM_PROMPT};
use crate::remote::{ClassifyRequest, ProviderTransport};
use crate::retry::is_transient_signal;
use async_trait::async_trait;
use flagwise_core::{Error, Result};
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::{json, Value};

/// Longest error body quoted in an error message
const MAX_ERROR_BODY: usize = 200;

/// `reqwest`-backed [`ProviderTransport`]
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    name: String,
    api: ApiFlavor,
    endpoint: String,
    model: Option<String>,
    credential: Credential,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

impl HttpTransport {
    /// Build a transport for a provider whose credential has been resolved
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        let credential = config.credential.clone().ok_or_else(|| {
            Error::config(format!(
                "{} API key not configured (set {})",
                config.name, config.api_key_env
            ))
        })?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            name: config.name.clone(),
            api: config.api,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            credential,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    fn build_request(&self, request: &ClassifyRequest) -> reqwest::RequestBuilder {
        let key = self.credential.expose();
        match self.api {
            ApiFlavor::Gemini => self
                .client
                .post(&self.endpoint)
                .query(&[("key", key)])
                .json(&json!({
                    "contents": [{ "parts": [{ "text": combined_prompt(request) }] }],
                    "generationConfig": {
                        "temperature": self.temperature,
                        "maxOutputTokens": self.max_tokens,
                    },
                })),
            ApiFlavor::OpenaiChat => self.client.post(&self.endpoint).bearer_auth(key).json(
                &ChatRequest {
                    model: self.model.as_deref(),
                    messages: vec![
                        ChatMessage {
                            role: "system",
                            content: SYSTEM_PROMPT.to_string(),
                        },
                        ChatMessage {
                            role: "user",
                            content: user_prompt(request),
                        },
                    ],
                    temperature: self.temperature,
                    max_tokens: self.max_tokens,
                },
            ),
        }
    }

    fn extract_answer(&self, body: &Value) -> Result<String> {
        let pointer = match self.api {
            ApiFlavor::Gemini => "/candidates/0/content/parts/0/text",
            ApiFlavor::OpenaiChat => "/choices/0/message/content",
        };
        body.pointer(pointer)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| Error::protocol(format!("Invalid response format from {}", self.name)))
    }
}

/// Map a non-success status to the error taxonomy
pub fn status_error(provider: &str, status: StatusCode, body: &str) -> Error {
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        return Error::transient(format!("Temporary error: {}", status.as_u16()));
    }
    let body: String = body.chars().take(MAX_ERROR_BODY).collect();
    Error::permanent(format!(
        "{} API Error: {} - {}",
        provider,
        status.as_u16(),
        body.trim()
    ))
}

fn request_error(provider: &str, err: reqwest::Error) -> Error {
    let msg = format!("{} request failed: {}", provider, err);
    if err.is_timeout() || err.is_connect() || is_transient_signal(&msg) {
        Error::transient(msg)
    } else {
        Error::permanent(msg)
    }
}

#[async_trait]
impl ProviderTransport for HttpTransport {
    async fn send(&self, request: &ClassifyRequest) -> Result<String> {
        let response = self
            .build_request(request)
            .send()
            .await
            .map_err(|e| request_error(&self.name, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(provider = %self.name, status = status.as_u16(), "Provider API error");
            return Err(status_error(&self.name, status, &body));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| Error::protocol(format!("{} returned undecodable body: {}", self.name, e)))?;

        self.extract_answer(&body)
    }
}
