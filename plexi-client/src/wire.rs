//! Request and response types for the chat-completions wire format.
//!
//! Perplexity follows the OpenAI chat format: a request carries a model name
//! and a message list; a non-streaming response carries a list of choices,
//! each with a complete message; a streaming response is a sequence of chunks
//! whose choices carry incremental deltas.

use serde::{Deserialize, Serialize};

/// Role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System message setting context/behavior.
    System,
    /// User message.
    User,
    /// Assistant response.
    Assistant,
}

/// A message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender.
    pub role: Role,
    /// Text content.
    pub content: String,
}

impl Message {
    /// Create a message with an explicit role.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }
}

/// Request for a chat completion.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    /// Model name to address.
    pub model: String,
    /// Conversation messages.
    pub messages: Vec<Message>,
    /// Maximum tokens to generate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Whether to stream the response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
}

impl ChatRequest {
    /// Create a new chat request.
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            max_tokens: None,
            stream: None,
        }
    }

    /// Set the maximum tokens to generate.
    pub fn max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = Some(tokens);
        self
    }

    /// Enable streaming.
    pub fn stream(mut self) -> Self {
        self.stream = Some(true);
        self
    }
}

/// One candidate completion in a response.
#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    /// The completed message.
    pub message: Message,
    /// Reason generation stopped.
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Response from a chat completion request.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    /// Candidate completions; at least one for a well-formed response.
    pub choices: Vec<Choice>,
}

/// Incremental content carried by one streaming chunk.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Delta {
    /// Role, present on the first chunk only.
    #[serde(default)]
    pub role: Option<String>,
    /// Incremental text content.
    #[serde(default)]
    pub content: Option<String>,
}

/// One choice within a streaming chunk.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamChoice {
    /// The incremental delta.
    pub delta: Delta,
    /// Reason generation stopped, on the final chunk.
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// A chunk from a streaming response.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamChunk {
    /// Choices carrying deltas; one for a single-completion stream.
    pub choices: Vec<StreamChoice>,
}
