//! Core traits and types for generative-model backends.
//!
//! This crate provides the shared interface between the reply pipeline and
//! the model provider. It defines:
//!
//! - [`Brain`] - text generation from an assembled instruction and history
//! - [`SpeechSynthesizer`] / [`Transcriber`] - optional audio backends
//! - [`GenerationRequest`] / [`Generation`] - request and result types
//! - [`BrainError`] - Error types for brain operations
//!
//! # Example
//!
//! ```rust
//! use brain_core::{async_trait, Brain, BrainError, Generation, GenerationRequest};
//!
//! struct FixedBrain;
//!
//! #[async_trait]
//! impl Brain for FixedBrain {
//!     async fn generate(&self, _request: GenerationRequest) -> Result<Generation, BrainError> {
//!         Ok(Generation::new("Hello!", 3))
//!     }
//!
//!     fn name(&self) -> &str {
//!         "FixedBrain"
//!     }
//! }
//! ```

mod error;
mod prompt;
mod request;
mod trait_def;

pub use error::BrainError;
pub use prompt::{hash_prompt, truncate_chars};
pub use request::{
    Generation, GenerationRequest, HistoryMessage, Role, SpeechRequest, SynthesizedAudio,
};
pub use trait_def::{Brain, SpeechSynthesizer, Transcriber};

// Re-export async_trait for convenience
pub use async_trait::async_trait;
