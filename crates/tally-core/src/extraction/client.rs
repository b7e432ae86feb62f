//! Chat-completions client for the vision extraction endpoint.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::context::CallContext;
use crate::error::ExtractError;
use crate::models::config::ServiceConfig;
use crate::models::receipt::ReceiptRecord;

/// A chat-completions request body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "is_zero_tokens")]
    pub max_tokens: u32,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: Vec<ContentPart>,
}

/// One part of a multi-part message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageUrl {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
    #[serde(default)]
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
}

/// Status and body of an HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

/// A decoded receipt together with the payload it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub record: ReceiptRecord,
    pub raw_text: String,
}

/// Sends a chat request and returns the raw reply.
pub trait ChatTransport: Send + Sync {
    fn send(
        &self,
        request: &ChatRequest,
    ) -> impl Future<Output = Result<RawResponse, ExtractError>> + Send;

    /// Pick up endpoint, credential or timeout changes.
    fn reconfigure(&mut self, _config: &ServiceConfig) -> Result<(), ExtractError> {
        Ok(())
    }
}

/// HTTPS transport backed by reqwest.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl HttpTransport {
    /// Build a transport for the configured endpoint.
    pub fn new(config: &ServiceConfig, api_key: impl Into<String>) -> Result<Self, ExtractError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("tally/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ExtractError::Request(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: config.chat_completions_url(),
            api_key: api_key.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl ChatTransport for HttpTransport {
    async fn send(&self, request: &ChatRequest) -> Result<RawResponse, ExtractError> {
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(map_reqwest_error)?;

        Ok(RawResponse { status, body })
    }

    fn reconfigure(&mut self, config: &ServiceConfig) -> Result<(), ExtractError> {
        let api_key = config
            .resolve_api_key()
            .unwrap_or_else(|| self.api_key.clone());
        *self = HttpTransport::new(config, api_key)?;
        Ok(())
    }
}

fn map_reqwest_error(err: reqwest::Error) -> ExtractError {
    if err.is_timeout() {
        ExtractError::Timeout(err.to_string())
    } else if err.is_builder() {
        ExtractError::Request(err.to_string())
    } else {
        ExtractError::Transport(err.to_string())
    }
}

/// Model parameters taken from the service configuration.
#[derive(Debug, Clone, PartialEq)]
struct ModelSettings {
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl From<&ServiceConfig> for ModelSettings {
    fn from(config: &ServiceConfig) -> Self {
        Self {
            model: config.vision_model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }
}

/// Issues extraction requests and interprets the replies.
#[derive(Debug, Clone)]
pub struct ExtractionClient<T = HttpTransport> {
    transport: T,
    settings: ModelSettings,
}

impl ExtractionClient<HttpTransport> {
    /// Client for the configured HTTPS endpoint.
    pub fn from_config(config: &ServiceConfig, api_key: impl Into<String>) -> Result<Self, ExtractError> {
        Ok(Self::with_transport(HttpTransport::new(config, api_key)?, config))
    }
}

impl<T: ChatTransport> ExtractionClient<T> {
    /// Client over an arbitrary transport.
    pub fn with_transport(transport: T, config: &ServiceConfig) -> Self {
        Self {
            transport,
            settings: ModelSettings::from(config),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Apply a new configuration to the model settings and transport.
    pub fn reconfigure(&mut self, config: &ServiceConfig) -> Result<(), ExtractError> {
        self.transport.reconfigure(config)?;
        self.settings = ModelSettings::from(config);
        Ok(())
    }

    /// Single user turn: prompt text plus a high-detail image, JSON-object reply.
    pub fn build_request(&self, image_url: &str, prompt: &str) -> ChatRequest {
        ChatRequest {
            model: self.settings.model.clone(),
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: vec![
                    ContentPart::Text {
                        text: prompt.to_string(),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: image_url.to_string(),
                            detail: Some("high".to_string()),
                        },
                    },
                ],
            }],
            response_format: Some(ResponseFormat {
                kind: "json_object".to_string(),
            }),
        }
    }

    /// Extract a receipt from an image data URI or URL.
    pub async fn extract(
        &self,
        ctx: &CallContext,
        image_url: &str,
        prompt: &str,
    ) -> Result<Extraction, ExtractError> {
        let request = self.build_request(image_url, prompt);
        debug!(
            "Sending extraction request: model={}, prompt={} chars, image={} chars",
            request.model,
            prompt.len(),
            image_url.len()
        );

        let raw = ctx.run(self.transport.send(&request)).await?;
        interpret_response(raw)
    }
}

/// Turn a raw endpoint reply into a receipt or a classified error.
pub fn interpret_response(raw: RawResponse) -> Result<Extraction, ExtractError> {
    let RawResponse { status, body } = raw;

    if !(200..300).contains(&status) {
        if let Ok(ApiErrorEnvelope { error: Some(error) }) = serde_json::from_str(&body) {
            if !error.message.is_empty() {
                return Err(ExtractError::Api {
                    status: Some(status),
                    message: error.message,
                });
            }
        }
        return Err(ExtractError::Status { status, body });
    }

    let response: ChatResponse = match serde_json::from_str(&body) {
        Ok(response) => response,
        Err(e) => {
            return Err(ExtractError::ResponseParse {
                message: e.to_string(),
                raw_text: body,
            });
        }
    };

    if let Some(error) = response.error.filter(|e| !e.message.is_empty()) {
        return Err(ExtractError::Api {
            status: Some(status),
            message: error.message,
        });
    }

    if let Some(usage) = &response.usage {
        trace!(
            "Token usage: prompt={}, completion={}, model={:?}",
            usage.prompt_tokens, usage.completion_tokens, response.model
        );
    }

    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or(ExtractError::EmptyChoices)?;

    if let Some(refusal) = choice.message.refusal.filter(|r| !r.trim().is_empty()) {
        return Err(ExtractError::Api {
            status: Some(status),
            message: format!("request refused: {refusal}"),
        });
    }

    let content = choice.message.content.unwrap_or_default();
    debug!(
        "Received {} chars of receipt content (finish_reason={:?})",
        content.len(),
        choice.finish_reason
    );

    let mut record = match ReceiptRecord::from_json(&content) {
        Ok(record) => record,
        Err(e) => {
            return Err(ExtractError::ReceiptParse {
                message: e.to_string(),
                raw_text: content,
            });
        }
    };
    record.raw_text = Some(content.clone());

    Ok(Extraction {
        record,
        raw_text: content,
    })
}

fn is_zero_tokens(value: &u32) -> bool {
    *value == 0
}
