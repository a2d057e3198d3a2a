//! OpenAI-compatible backend for the messaging inbox.
//!
//! This crate provides [`OpenAiBrain`], which implements the text
//! generation, speech synthesis, and transcription traits from
//! `brain-core` against an OpenAI-style HTTP API.
//!
//! # Example
//!
//! ```rust,ignore
//! use brain_core::{Brain, GenerationRequest};
//! use openai_brain::{OpenAiBrain, OpenAiBrainConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let brain = OpenAiBrain::new(OpenAiBrainConfig::from_env()?)?;
//!
//!     let generation = brain
//!         .generate(GenerationRequest {
//!             model: "gpt-4o-mini".to_string(),
//!             instruction: "You answer questions about our bakery.".to_string(),
//!             history: vec![],
//!             message: "¿Abren el domingo?".to_string(),
//!             max_tokens: 200,
//!             temperature: 0.7,
//!         })
//!         .await?;
//!     println!("{} ({} tokens)", generation.text, generation.tokens_used);
//!     Ok(())
//! }
//! ```

mod api_types;
mod brain;
mod config;

pub use brain::OpenAiBrain;
pub use config::{OpenAiBrainConfig, OpenAiBrainConfigBuilder};
