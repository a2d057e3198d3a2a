//! Echo brain implementation - echoes messages back.

use brain_core::{async_trait, Brain, BrainError, Generation, GenerationRequest};

/// A simple brain that echoes the triggering message back.
///
/// Reports one token per whitespace-separated word of the reply.
#[derive(Debug, Clone, Default)]
pub struct EchoBrain {
    /// Optional prefix to add before the echo.
    prefix: Option<String>,
}

impl EchoBrain {
    /// Create a new EchoBrain with no prefix.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new EchoBrain with a custom prefix.
    ///
    /// # Example
    ///
    /// ```rust
    /// use mock_brain::EchoBrain;
    ///
    /// let brain = EchoBrain::with_prefix("Echo: ");
    /// // Will respond with "Echo: <original message>"
    /// ```
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }
}

#[async_trait]
impl Brain for EchoBrain {
    async fn generate(&self, request: GenerationRequest) -> Result<Generation, BrainError> {
        let text = match &self.prefix {
            Some(prefix) => format!("{}{}", prefix, request.message),
            None => request.message,
        };

        if text.trim().is_empty() {
            return Err(BrainError::EmptyResponse);
        }

        let tokens = text.split_whitespace().count() as u32;
        Ok(Generation::new(text, tokens))
    }

    fn name(&self) -> &str {
        "EchoBrain"
    }
}
