use std::fmt::Write as _;

use super::transport::RequestMessage;
use crate::model::{ChatMessage, MessageSource, Role};
use crate::util::truncate_chars;

const BASE_PROMPT: &str = "You are a laboratory assistant inside an electronic lab notebook. \
Answer concisely, prefer concrete protocol steps, and flag safety concerns.";
const MAX_CONTEXT_RECORDS: usize = 5;
const MAX_CONTEXT_CHARS: usize = 1_500;

/// What the user is looking at when they ask.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChatContext {
    pub topic: Option<String>,
    /// Titles of recent records, newest first.
    pub recent_records: Vec<String>,
    pub notes: String,
}

impl ChatContext {
    pub fn is_empty(&self) -> bool {
        self.topic.is_none() && self.recent_records.is_empty() && self.notes.trim().is_empty()
    }
}

pub fn system_prompt(context: &ChatContext) -> String {
    let mut prompt = BASE_PROMPT.to_owned();
    if context.is_empty() {
        return prompt;
    }

    prompt.push_str("\n\nContext:");
    if let Some(topic) = &context.topic {
        let _ = write!(prompt, "\n- Active project: {topic}");
    }
    if !context.recent_records.is_empty() {
        prompt.push_str("\n- Recent experiments:");
        for title in context.recent_records.iter().take(MAX_CONTEXT_RECORDS) {
            let _ = write!(prompt, "\n  - {title}");
        }
    }
    let notes = context.notes.trim();
    if !notes.is_empty() {
        let _ = write!(prompt, "\n- Notes: {}", truncate_chars(notes, MAX_CONTEXT_CHARS));
    }
    prompt
}

/// System prompt, the last `history_limit` conversational messages and the
/// new user message. Canned fallback replies are left out of the history.
pub fn build_messages(
    history: &[ChatMessage],
    history_limit: usize,
    text: &str,
    context: &ChatContext,
) -> Vec<RequestMessage> {
    let relevant = history
        .iter()
        .filter(|message| message.role != Role::System && message.source != MessageSource::Fallback)
        .collect::<Vec<_>>();
    let skip = relevant.len().saturating_sub(history_limit);

    let mut messages = Vec::with_capacity(relevant.len() - skip + 2);
    messages.push(RequestMessage::new(Role::System, system_prompt(context)));
    messages.extend(
        relevant[skip..]
            .iter()
            .map(|message| RequestMessage::new(message.role, message.content.clone())),
    );
    messages.push(RequestMessage::new(Role::User, text));
    messages
}
