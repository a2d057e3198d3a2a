//! Webhook batch ingestion.
//!
//! Every notification is handled on its own: a malformed one is skipped and
//! its siblings still go through. Deduplication rests on the unique external
//! message id in storage, so concurrent redeliveries are absorbed there.

use database::{
    conversation, message, settings, ContentType, Database, Direction, MessageStatus, NewMessage,
};
use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use whatsapp_cloud::{ChangeValue, InboundMessage, StatusNotification, WebhookPayload};

use crate::balancer::AgentBalancer;
use crate::error::OrchestratorError;
use crate::reconciler::{StatusOutcome, StatusReconciler};
use crate::reply::{eligibility, ReplyOrchestrator, ReplyOutcome};

/// What happened to one notification of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum NotificationOutcome {
    /// A new inbound message was stored.
    Stored {
        conversation_id: i64,
        message_id: i64,
        created_conversation: bool,
        /// Result of the reply attempt; `None` if it failed on storage.
        reply: Option<ReplyOutcome>,
    },
    /// The message id was already stored; nothing changed.
    Duplicate { wa_message_id: String },
    /// A delivery receipt was applied.
    Status { result: StatusOutcome },
    /// The notification was unusable and was dropped.
    Skipped { reason: String },
    /// Storage failed while handling the notification.
    Failed { reason: String },
}

/// Outcomes of one webhook batch, in delivery order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub outcomes: Vec<NotificationOutcome>,
}

impl IngestReport {
    /// Number of newly stored messages.
    pub fn stored(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, NotificationOutcome::Stored { .. }))
            .count()
    }

    /// Number of redelivered messages.
    pub fn duplicates(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, NotificationOutcome::Duplicate { .. }))
            .count()
    }
}

/// Map a provider message type to a stored content type.
pub fn content_type_for(message_type: &str) -> ContentType {
    match message_type {
        "text" => ContentType::Text,
        "image" | "sticker" => ContentType::Image,
        "audio" | "voice" => ContentType::Audio,
        "location" => ContentType::Location,
        _ => ContentType::Other,
    }
}

/// Map a provider status string to a stored status.
///
/// Only forward progress receipts apply; `failed` and unknown values yield `None`.
pub fn receipt_status(status: &str) -> Option<MessageStatus> {
    match status {
        "sent" => Some(MessageStatus::Sent),
        "delivered" => Some(MessageStatus::Delivered),
        "read" => Some(MessageStatus::Read),
        _ => None,
    }
}

/// Turns provider notifications into stored state.
#[derive(Clone)]
pub struct EventIngestor {
    db: Database,
    balancer: AgentBalancer,
    reconciler: StatusReconciler,
    replies: ReplyOrchestrator,
}

type PendingReply = (usize, JoinHandle<Result<ReplyOutcome, OrchestratorError>>);

impl EventIngestor {
    pub fn new(db: Database, replies: ReplyOrchestrator) -> Self {
        Self {
            balancer: AgentBalancer::new(db.clone()),
            reconciler: StatusReconciler::new(db.clone()),
            db,
            replies,
        }
    }

    /// Process a webhook batch.
    ///
    /// Replies run as separate tasks, started only after their message is
    /// stored, so a slow model call never holds up other notifications. The
    /// report is returned once every reply attempt has finished.
    pub async fn ingest(&self, payload: &WebhookPayload) -> IngestReport {
        let mut report = IngestReport::default();
        let mut pending: Vec<PendingReply> = Vec::new();

        for change in payload.message_changes() {
            for raw in &change.messages {
                let (outcome, reply) = match self.ingest_message(change, raw).await {
                    Ok(result) => result,
                    Err(e) => {
                        error!(error = %e, "Failed to store inbound message");
                        (
                            NotificationOutcome::Failed {
                                reason: e.to_string(),
                            },
                            None,
                        )
                    }
                };

                if let Some((conversation_id, message_id)) = reply {
                    let replies = self.replies.clone();
                    let handle =
                        tokio::spawn(async move { replies.reply_to(conversation_id, message_id).await });
                    pending.push((report.outcomes.len(), handle));
                }
                report.outcomes.push(outcome);
            }

            for raw in &change.statuses {
                let outcome = self.ingest_status(raw).await;
                report.outcomes.push(outcome);
            }
        }

        for (index, handle) in pending {
            let result = match handle.await {
                Ok(Ok(outcome)) => Some(outcome),
                Ok(Err(e)) => {
                    error!(error = %e, "Reply attempt failed");
                    None
                }
                Err(e) => {
                    error!(error = %e, "Reply task panicked");
                    None
                }
            };

            if let Some(NotificationOutcome::Stored { reply, .. }) = report.outcomes.get_mut(index) {
                *reply = result;
            }
        }

        info!(
            notifications = report.outcomes.len(),
            stored = report.stored(),
            duplicates = report.duplicates(),
            "Webhook batch processed"
        );
        report
    }

    /// Store one inbound message. Returns the outcome and, when a reply is
    /// due, the conversation and message to reply to.
    async fn ingest_message(
        &self,
        change: &ChangeValue,
        raw: &Value,
    ) -> Result<(NotificationOutcome, Option<(i64, i64)>), OrchestratorError> {
        let inbound = match InboundMessage::from_value(raw) {
            Ok(inbound) => inbound,
            Err(e) => {
                warn!(error = %e, "Skipping malformed message notification");
                return Ok((
                    NotificationOutcome::Skipped {
                        reason: format!("malformed message: {}", e),
                    },
                    None,
                ));
            }
        };

        if inbound.id.trim().is_empty() || inbound.from.trim().is_empty() {
            warn!("Skipping message notification without id or sender");
            return Ok((
                NotificationOutcome::Skipped {
                    reason: "message without id or sender".to_string(),
                },
                None,
            ));
        }

        let profile_name = change.profile_name(&inbound.from);
        let (conv, created) =
            conversation::upsert_conversation(self.db.pool(), &inbound.from, profile_name).await?;
        // Also retried for existing unassigned conversations, so a failed
        // assignment on first contact is repaired by the next delivery.
        if created || conv.assigned_operator_id.is_none() {
            self.balancer.assign(conv.id).await?;
        }

        let content_type = content_type_for(&inbound.message_type);
        let new_message = NewMessage {
            conversation_id: conv.id,
            wa_message_id: Some(inbound.id.clone()),
            direction: Direction::In,
            content_type,
            body: inbound.text_body().map(str::to_string),
            media_ref: inbound.media().map(|m| m.id.clone()),
            status: MessageStatus::Received,
            automated: false,
            operator_id: None,
            timestamp: inbound
                .timestamp_secs()
                .unwrap_or_else(|| chrono::Utc::now().timestamp()),
            raw_payload: Some(raw.to_string()),
        };

        let Some(stored) = message::insert_message(self.db.pool(), &new_message).await? else {
            debug!(wa_message_id = %inbound.id, "Duplicate message ignored");
            return Ok((
                NotificationOutcome::Duplicate {
                    wa_message_id: inbound.id,
                },
                None,
            ));
        };

        conversation::record_last_message(
            self.db.pool(),
            conv.id,
            stored.id,
            &stored.summary(),
            stored.timestamp,
        )
        .await?;

        info!(
            conversation_id = conv.id,
            message_id = stored.id,
            wa_message_id = %inbound.id,
            content_type = %content_type,
            created_conversation = created,
            "Inbound message stored"
        );

        let settings = settings::get_settings(self.db.pool()).await?;
        let (reply, pending) = match eligibility(&settings, &conv) {
            Some(reason) => (Some(ReplyOutcome::Skipped(reason)), None),
            None => (None, Some((conv.id, stored.id))),
        };

        Ok((
            NotificationOutcome::Stored {
                conversation_id: conv.id,
                message_id: stored.id,
                created_conversation: created,
                reply,
            },
            pending,
        ))
    }

    async fn ingest_status(&self, raw: &Value) -> NotificationOutcome {
        let notification = match StatusNotification::from_value(raw) {
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "Skipping malformed status notification");
                return NotificationOutcome::Skipped {
                    reason: format!("malformed status: {}", e),
                };
            }
        };

        let Some(status) = receipt_status(&notification.status) else {
            debug!(
                wa_message_id = %notification.id,
                status = %notification.status,
                errors = notification.errors.len(),
                "Skipping unsupported status"
            );
            return NotificationOutcome::Skipped {
                reason: format!("unsupported status: {}", notification.status),
            };
        };

        match self.reconciler.apply(&notification.id, status).await {
            Ok(result) => NotificationOutcome::Status { result },
            Err(e) => {
                error!(wa_message_id = %notification.id, error = %e, "Failed to apply status");
                NotificationOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }
}
