//! Wire types for the WhatsApp Cloud API.

mod send;
mod webhook;

pub use send::*;
pub use webhook::*;
