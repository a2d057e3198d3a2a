//! Delivery and read receipts.

use database::{message, Database, MessageStatus, StatusUpdate};
use serde::Serialize;
use tracing::{debug, info};

/// What a receipt did to the stored message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum StatusOutcome {
    /// The status moved forward.
    Advanced {
        from: MessageStatus,
        to: MessageStatus,
    },
    /// The message was already at or past this status.
    Unchanged { current: MessageStatus },
    /// No stored message has this id; the receipt was dropped.
    UnknownMessage,
}

/// Applies receipts to stored messages, never moving a status backwards.
#[derive(Debug, Clone)]
pub struct StatusReconciler {
    db: Database,
}

impl StatusReconciler {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Apply one receipt.
    pub async fn apply(
        &self,
        wa_message_id: &str,
        status: MessageStatus,
    ) -> database::Result<StatusOutcome> {
        let outcome = match message::advance_status(self.db.pool(), wa_message_id, status).await? {
            StatusUpdate::Advanced { from, to } => {
                info!(wa_message_id, from = from.as_str(), to = to.as_str(), "Message status advanced");
                StatusOutcome::Advanced { from, to }
            }
            StatusUpdate::Unchanged { current } => {
                debug!(
                    wa_message_id,
                    current = current.as_str(),
                    incoming = status.as_str(),
                    "Stale receipt ignored"
                );
                StatusOutcome::Unchanged { current }
            }
            StatusUpdate::NotFound => {
                debug!(wa_message_id, "Receipt for unknown message dropped");
                StatusOutcome::UnknownMessage
            }
        };

        Ok(outcome)
    }
}
