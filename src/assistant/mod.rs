//! Chat glue: prompt shaping, HTTP transport and the offline fallback.

pub mod fallback;
mod prompt;
mod transport;

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::AssistantError;
use crate::model::{AssistantSettings, ChatMessage, ChatSession, MessageSource};
use crate::util::short_id;

pub use prompt::{ChatContext, build_messages, system_prompt};
pub use transport::{ChatRequest, ChatTransport, HttpTransport, RequestMessage};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone, Debug, PartialEq)]
pub struct AssistantConfig {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub history_limit: usize,
    pub timeout: Duration,
}

impl AssistantConfig {
    pub fn from_settings(settings: &AssistantSettings) -> Self {
        Self {
            endpoint: settings
                .endpoint
                .clone()
                .filter(|endpoint| !endpoint.trim().is_empty()),
            api_key: settings.api_key.clone().filter(|key| !key.is_empty()),
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            history_limit: settings.history_limit,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.endpoint.is_some()
    }

    fn request(&self, messages: Vec<RequestMessage>) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self::from_settings(&AssistantSettings::default())
    }
}

/// Outcome of one chat turn. Always carries text to show.
#[derive(Clone, Debug, PartialEq)]
pub struct AssistantReply {
    pub content: String,
    pub source: MessageSource,
    /// Why the fallback was used, if it was.
    pub fallback_reason: Option<String>,
}

impl AssistantReply {
    fn fallback(text: &str, reason: String) -> Self {
        Self {
            content: fallback::reply_for(text).to_owned(),
            source: MessageSource::Fallback,
            fallback_reason: Some(reason),
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.source == MessageSource::Fallback
    }

    pub fn to_message(&self) -> ChatMessage {
        ChatMessage::assistant(self.content.clone(), self.source)
    }
}

/// Cheap to clone; clones share the transport.
#[derive(Clone)]
pub struct Assistant {
    config: AssistantConfig,
    transport: Option<Arc<dyn ChatTransport>>,
}

impl Assistant {
    pub fn new(config: AssistantConfig, transport: Arc<dyn ChatTransport>) -> Self {
        Self {
            config,
            transport: Some(transport),
        }
    }

    /// Assistant over HTTP. If the client cannot be built every reply falls
    /// back.
    pub fn http(config: AssistantConfig) -> Self {
        let transport = match HttpTransport::new(config.timeout) {
            Ok(transport) => Some(Arc::new(transport) as Arc<dyn ChatTransport>),
            Err(error) => {
                warn!(%error, "assistant transport unavailable");
                None
            }
        };
        Self { config, transport }
    }

    pub fn config(&self) -> &AssistantConfig {
        &self.config
    }

    /// One request to the model; errors are returned, no fallback.
    pub fn complete(&self, messages: Vec<RequestMessage>) -> Result<String, AssistantError> {
        if !self.config.is_configured() {
            return Err(AssistantError::NotConfigured);
        }
        let transport = self.transport.as_ref().ok_or(AssistantError::NotConfigured)?;
        transport.complete(&self.config, &self.config.request(messages))
    }

    /// Answers `text` in the context of `session`. Never fails: when the
    /// model cannot be used the reply is a canned one flagged as fallback.
    pub fn send(&self, session: &ChatSession, text: &str, context: &ChatContext) -> AssistantReply {
        let messages = build_messages(&session.messages, self.config.history_limit, text, context);
        match self.complete(messages) {
            Ok(content) => {
                debug!(session = short_id(&session.id), "model replied");
                AssistantReply {
                    content,
                    source: MessageSource::Model,
                    fallback_reason: None,
                }
            }
            Err(error) => {
                warn!(session = short_id(&session.id), %error, "chat falling back to canned reply");
                AssistantReply::fallback(text, error.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    struct Scripted {
        reply: Result<&'static str, u16>,
        seen: Mutex<Vec<ChatRequest>>,
    }

    impl ChatTransport for Scripted {
        fn complete(
            &self,
            _config: &AssistantConfig,
            request: &ChatRequest,
        ) -> Result<String, AssistantError> {
            self.seen.lock().unwrap().push(request.clone());
            match self.reply {
                Ok(text) => Ok(text.to_owned()),
                Err(status) => Err(AssistantError::Status {
                    status,
                    body: String::new(),
                }),
            }
        }
    }

    fn configured() -> AssistantConfig {
        AssistantConfig {
            endpoint: Some("http://localhost/v1/chat/completions".to_owned()),
            ..AssistantConfig::default()
        }
    }

    #[test]
    fn model_reply_is_tagged_as_model() {
        let transport = Arc::new(Scripted {
            reply: Ok("Use 37 °C."),
            seen: Mutex::new(Vec::new()),
        });
        let assistant = Assistant::new(configured(), transport.clone());
        let reply = assistant.send(&ChatSession::new("s"), "Temperature?", &ChatContext::default());

        assert_eq!(reply.content, "Use 37 °C.");
        assert_eq!(reply.source, MessageSource::Model);
        let seen = transport.seen.lock().unwrap();
        assert_eq!(seen[0].model, "gpt-4o-mini");
        assert_eq!(seen[0].messages.last().unwrap().content, "Temperature?");
    }

    #[test]
    fn http_error_falls_back_with_reason() {
        let transport = Arc::new(Scripted {
            reply: Err(503),
            seen: Mutex::new(Vec::new()),
        });
        let assistant = Assistant::new(configured(), transport);
        let reply = assistant.send(&ChatSession::new("s"), "Help", &ChatContext::default());

        assert!(reply.is_fallback());
        assert!(!reply.content.is_empty());
        assert!(reply.fallback_reason.unwrap().contains("503"));
    }

    #[test]
    fn unconfigured_assistant_never_calls_transport() {
        let transport = Arc::new(Scripted {
            reply: Ok("unused"),
            seen: Mutex::new(Vec::new()),
        });
        let assistant = Assistant::new(AssistantConfig::default(), transport.clone());
        let reply = assistant.send(&ChatSession::new("s"), "Help", &ChatContext::default());

        assert!(reply.is_fallback());
        assert!(transport.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn unreachable_endpoint_falls_back() {
        let config = AssistantConfig {
            endpoint: Some("http://127.0.0.1:9/v1/chat/completions".to_owned()),
            timeout: Duration::from_secs(2),
            ..AssistantConfig::default()
        };
        let reply = Assistant::http(config).send(
            &ChatSession::new("s"),
            "Is anyone there?",
            &ChatContext::default(),
        );
        assert!(reply.is_fallback());
        assert!(!reply.content.is_empty());
    }
}
