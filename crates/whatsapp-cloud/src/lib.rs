//! WhatsApp Cloud API client library.
//!
//! This crate provides a Rust client for the WhatsApp Cloud API. It supports:
//!
//! - Sending text and media messages
//! - Uploading and downloading media
//! - Parsing webhook deliveries (inbound messages and delivery statuses)
//! - Verifying webhook signatures and the subscription handshake
//!
//! # Example
//!
//! ```no_run
//! use whatsapp_cloud::{CloudClient, CloudConfig};
//!
//! # async fn example() -> Result<(), whatsapp_cloud::CloudError> {
//! let config = CloudConfig::new("106540352242922").with_access_token("EAAG...");
//! let client = CloudClient::new(config)?;
//!
//! let wa_message_id = client.send_text("5215551234567", "¡Hola!").await?;
//! println!("Sent as {}", wa_message_id);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod types;
pub mod webhook;

pub use client::CloudClient;
pub use config::{CloudConfig, DEFAULT_API_BASE};
pub use error::CloudError;
pub use types::*;
pub use webhook::{verify_signature, verify_subscription};
