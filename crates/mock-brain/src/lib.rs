//! Mock backends for the messaging inbox.
//!
//! This crate provides deterministic implementations of the `brain-core`
//! traits for testing:
//! - `EchoBrain` - Echoes the triggering message back
//! - `ScriptedBrain` - Answers from a fixed script and records every request
//! - `FailingBrain` - Always fails with a chosen error
//! - `DelayedBrain` - Wraps another brain with artificial delay
//! - `MockSynthesizer` / `MockTranscriber` - Audio backends
//!
//! For production generation, use the `openai-brain` crate instead.
//!
//! # Example
//!
//! ```rust
//! use mock_brain::{Brain, GenerationRequest, ScriptedBrain};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), mock_brain::BrainError> {
//!     let brain = ScriptedBrain::always("¡Claro! Cuesta $250.");
//!
//!     let generation = brain
//!         .generate(GenerationRequest {
//!             model: "test".to_string(),
//!             instruction: String::new(),
//!             history: vec![],
//!             message: "precio?".to_string(),
//!             max_tokens: 100,
//!             temperature: 0.0,
//!         })
//!         .await?;
//!     assert_eq!(generation.text, "¡Claro! Cuesta $250.");
//!     assert_eq!(brain.call_count(), 1);
//!     Ok(())
//! }
//! ```

mod audio;
mod delayed;
mod echo;
mod failing;
mod scripted;

// Re-export brain-core types for convenience
pub use brain_core::{
    async_trait, Brain, BrainError, Generation, GenerationRequest, SpeechRequest,
    SpeechSynthesizer, SynthesizedAudio, Transcriber,
};

pub use audio::{MockSynthesizer, MockTranscriber};
pub use delayed::DelayedBrain;
pub use echo::EchoBrain;
pub use failing::FailingBrain;
pub use scripted::ScriptedBrain;
