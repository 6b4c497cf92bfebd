use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::AssistantConfig;
use crate::error::AssistantError;
use crate::model::Role;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RequestMessage {
    pub role: &'static str,
    pub content: String,
}

impl RequestMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role: role.as_str(),
            content: content.into(),
        }
    }
}

/// Body of an OpenAI-style chat completion request.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<RequestMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Sends a completion request and returns the reply text.
pub trait ChatTransport: Send + Sync {
    fn complete(
        &self,
        config: &AssistantConfig,
        request: &ChatRequest,
    ) -> Result<String, AssistantError>;
}

pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, AssistantError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(AssistantError::Client)?;
        Ok(Self { client })
    }
}

impl ChatTransport for HttpTransport {
    fn complete(
        &self,
        config: &AssistantConfig,
        request: &ChatRequest,
    ) -> Result<String, AssistantError> {
        let endpoint = config.endpoint.as_deref().ok_or(AssistantError::NotConfigured)?;

        let mut builder = self.client.post(endpoint).json(request);
        if let Some(key) = config.api_key.as_deref() {
            builder = builder.bearer_auth(key);
        }
        debug!(
            endpoint,
            model = %request.model,
            messages = request.messages.len(),
            "sending chat request"
        );

        let response = builder.send().map_err(|source| AssistantError::Network {
            endpoint: endpoint.to_owned(),
            source,
        })?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(AssistantError::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        let body: ChatResponse = response
            .json()
            .map_err(|error| AssistantError::InvalidResponse(error.to_string()))?;
        first_content(body)
    }
}

fn first_content(body: ChatResponse) -> Result<String, AssistantError> {
    body.choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| AssistantError::InvalidResponse("no choices[0].message.content".to_owned()))
}
