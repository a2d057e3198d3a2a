//! Request and response types for model calls.

use serde::{Deserialize, Serialize};

/// Who authored a history message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The external contact (inbound messages).
    Contact,
    /// The business side (outbound messages, human or automated).
    Assistant,
}

impl Role {
    /// Role name in OpenAI-style chat APIs.
    pub fn chat_role(&self) -> &'static str {
        match self {
            Role::Contact => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A single message in the conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryMessage {
    pub role: Role,
    pub content: String,
}

impl HistoryMessage {
    /// Create a contact message.
    pub fn contact(content: impl Into<String>) -> Self {
        Self {
            role: Role::Contact,
            content: content.into(),
        }
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// One text-generation call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRequest {
    /// Model name.
    pub model: String,
    /// Assembled instruction (system prompt).
    pub instruction: String,
    /// Prior messages, oldest first.
    pub history: Vec<HistoryMessage>,
    /// The message being answered.
    pub message: String,
    /// Maximum output tokens.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
}

/// A successful generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    pub text: String,
    /// Total tokens consumed (prompt + completion), 0 if unreported.
    pub tokens_used: u32,
}

impl Generation {
    pub fn new(text: impl Into<String>, tokens_used: u32) -> Self {
        Self {
            text: text.into(),
            tokens_used,
        }
    }
}

/// A text-to-speech call.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechRequest {
    pub text: String,
    pub voice: String,
    pub speed: f32,
}

/// Encoded audio returned by a synthesizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedAudio {
    pub bytes: Vec<u8>,
    /// MIME type, e.g. `audio/ogg`.
    pub mime_type: String,
}
