//! Scripted brain implementation - answers from a fixed script.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use brain_core::{async_trait, Brain, BrainError, Generation, GenerationRequest};

/// A brain that returns pre-written replies and records every request.
///
/// Replies queued with [`ScriptedBrain::new`] are returned in order; once
/// they run out the fallback reply (if any) is repeated, otherwise the
/// brain answers with [`BrainError::EmptyResponse`].
#[derive(Debug, Default)]
pub struct ScriptedBrain {
    script: Mutex<VecDeque<String>>,
    fallback: Option<String>,
    tokens_per_reply: u32,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedBrain {
    /// Create a brain that answers with each reply once, in order.
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            script: Mutex::new(replies.into_iter().map(Into::into).collect()),
            tokens_per_reply: 10,
            ..Default::default()
        }
    }

    /// Create a brain that always answers with the same reply.
    pub fn always(reply: impl Into<String>) -> Self {
        Self {
            fallback: Some(reply.into()),
            tokens_per_reply: 10,
            ..Default::default()
        }
    }

    /// Set the token usage reported for each reply.
    pub fn with_tokens(mut self, tokens: u32) -> Self {
        self.tokens_per_reply = tokens;
        self
    }

    /// Number of generate calls received.
    pub fn call_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Every request received, oldest first.
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The most recent request, if any.
    pub fn last_request(&self) -> Option<GenerationRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }
}

#[async_trait]
impl Brain for ScriptedBrain {
    async fn generate(&self, request: GenerationRequest) -> Result<Generation, BrainError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);

        let next = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .or_else(|| self.fallback.clone());

        match next {
            Some(text) if !text.trim().is_empty() => {
                Ok(Generation::new(text, self.tokens_per_reply))
            }
            _ => Err(BrainError::EmptyResponse),
        }
    }

    fn name(&self) -> &str {
        "ScriptedBrain"
    }
}
