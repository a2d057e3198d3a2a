//! Backend trait definitions.

use async_trait::async_trait;

use crate::error::BrainError;
use crate::request::{Generation, GenerationRequest, SpeechRequest, SynthesizedAudio};

/// A generative text model.
///
/// This trait is object-safe and can be used with `Arc<dyn Brain>`.
#[async_trait]
pub trait Brain: Send + Sync {
    /// Generate a reply for the assembled request.
    ///
    /// Implementations return [`BrainError::EmptyResponse`] rather than an
    /// empty `Generation`.
    async fn generate(&self, request: GenerationRequest) -> Result<Generation, BrainError>;

    /// Get a human-readable name for this brain implementation.
    fn name(&self) -> &str;

    /// Check if the brain is ready to process messages.
    ///
    /// Default implementation always returns true.
    async fn is_ready(&self) -> bool {
        true
    }
}

/// Text-to-speech backend.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, request: SpeechRequest) -> Result<SynthesizedAudio, BrainError>;
}

/// Speech-to-text backend.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: Vec<u8>, mime_type: &str) -> Result<String, BrainError>;
}
