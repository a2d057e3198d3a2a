//! Outbound dispatch: send through the channel, then record.

use std::sync::Arc;
use std::time::Duration;

use database::{
    conversation, message, operator, Database, DatabaseError, Direction, Message, MessageStatus,
    NewMessage,
};
use serde::Serialize;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use whatsapp_cloud::DownloadedMedia;

use crate::balancer::AgentBalancer;
use crate::channel::{Channel, OutboundContent};
use crate::error::DispatchError;

/// Who authored an outbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Author {
    /// The reply pipeline or a follow-up pass.
    Automation,
    /// A human operator, when known.
    Operator(Option<i64>),
}

impl Author {
    fn automated(&self) -> bool {
        matches!(self, Author::Automation)
    }

    fn operator_id(&self) -> Option<i64> {
        match self {
            Author::Operator(id) => *id,
            Author::Automation => None,
        }
    }
}

/// One message to send.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    /// External contact identifier.
    pub to: String,
    pub content: OutboundContent,
    pub author: Author,
}

impl DispatchRequest {
    pub fn new(to: impl Into<String>, content: OutboundContent, author: Author) -> Self {
        Self {
            to: to.into(),
            content,
            author,
        }
    }
}

/// A message the channel accepted and that is now stored.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchedMessage {
    pub conversation_id: i64,
    pub message: Message,
    /// Whether the conversation was created by this dispatch.
    pub created_conversation: bool,
}

/// Sends messages and records the ones the channel accepts.
///
/// Nothing is stored unless the channel confirms the send, so a failed
/// dispatch leaves neither a message row nor a new conversation behind.
#[derive(Clone)]
pub struct OutboundDispatcher {
    db: Database,
    channel: Arc<dyn Channel>,
    balancer: AgentBalancer,
    send_timeout: Duration,
}

impl OutboundDispatcher {
    pub fn new(db: Database, channel: Arc<dyn Channel>, send_timeout: Duration) -> Self {
        Self {
            balancer: AgentBalancer::new(db.clone()),
            db,
            channel,
            send_timeout,
        }
    }

    /// Send a message to a contact, creating its conversation if needed.
    pub async fn dispatch(&self, request: DispatchRequest) -> Result<DispatchedMessage, DispatchError> {
        self.validate(&request).await?;
        let to = request.to.trim();

        let wa_message_id = match timeout(self.send_timeout, self.channel.send(to, &request.content)).await {
            Ok(Ok(id)) => id,
            Ok(Err(e)) => {
                let err = DispatchError::from(e);
                warn!(to, error = %err, transient = err.is_transient(), "Dispatch failed");
                return Err(err);
            }
            Err(_) => {
                warn!(to, timeout_secs = self.send_timeout.as_secs_f64(), "Dispatch timed out");
                return Err(DispatchError::Timeout);
            }
        };

        self.record(to, &request, &wa_message_id)
            .await
            .map_err(|source| {
                error!(to, wa_message_id = %wa_message_id, error = %source, "Message sent but not recorded");
                DispatchError::Unrecorded {
                    wa_message_id,
                    source,
                }
            })
    }

    /// Store a message the channel accepted, creating its conversation if needed.
    async fn record(
        &self,
        to: &str,
        request: &DispatchRequest,
        wa_message_id: &str,
    ) -> database::Result<DispatchedMessage> {
        let (conv, created) = conversation::upsert_conversation(self.db.pool(), to, None).await?;
        if created {
            match request.author.operator_id() {
                Some(operator_id) => {
                    conversation::assign_operator(self.db.pool(), conv.id, Some(operator_id)).await?
                }
                None => {
                    self.balancer.assign(conv.id).await?;
                }
            }
        }

        let new_message = NewMessage {
            conversation_id: conv.id,
            wa_message_id: Some(wa_message_id.to_string()),
            direction: Direction::Out,
            content_type: request.content.content_type(),
            body: request.content.body().map(str::to_string),
            media_ref: request.content.media_ref().map(str::to_string),
            status: MessageStatus::Sent,
            automated: request.author.automated(),
            operator_id: request.author.operator_id(),
            timestamp: chrono::Utc::now().timestamp(),
            raw_payload: None,
        };

        let stored = match message::insert_message(self.db.pool(), &new_message).await? {
            Some(m) => m,
            None => {
                debug!(wa_message_id, "Outbound id already stored");
                message::get_message_by_wa_id(self.db.pool(), wa_message_id)
                    .await?
                    .ok_or_else(|| DatabaseError::NotFound {
                        entity: "Message",
                        id: wa_message_id.to_string(),
                    })?
            }
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
            wa_message_id,
            automated = stored.automated,
            "Message dispatched"
        );

        Ok(DispatchedMessage {
            conversation_id: conv.id,
            message: stored,
            created_conversation: created,
        })
    }

    /// Send a message into an existing conversation.
    pub async fn dispatch_to_conversation(
        &self,
        conversation_id: i64,
        content: OutboundContent,
        author: Author,
    ) -> Result<DispatchedMessage, DispatchError> {
        let conv = conversation::get_conversation(self.db.pool(), conversation_id).await?;
        self.dispatch(DispatchRequest::new(conv.wa_id, content, author)).await
    }

    /// Upload media to the channel, bounded by the send timeout.
    pub async fn upload_media(&self, bytes: Vec<u8>, mime_type: &str) -> Result<String, DispatchError> {
        match timeout(self.send_timeout, self.channel.upload_media(bytes, mime_type)).await {
            Ok(result) => result.map_err(DispatchError::from),
            Err(_) => Err(DispatchError::Timeout),
        }
    }

    /// Download media from the channel, bounded by the send timeout.
    pub async fn fetch_media(&self, media_ref: &str) -> Result<DownloadedMedia, DispatchError> {
        match timeout(self.send_timeout, self.channel.fetch_media(media_ref)).await {
            Ok(result) => result.map_err(DispatchError::from),
            Err(_) => Err(DispatchError::Timeout),
        }
    }

    async fn validate(&self, request: &DispatchRequest) -> Result<(), DispatchError> {
        if request.to.trim().is_empty() {
            return Err(DispatchError::InvalidRequest("recipient is empty".to_string()));
        }

        match &request.content {
            OutboundContent::Text(body) if body.trim().is_empty() => {
                return Err(DispatchError::InvalidRequest("message text is empty".to_string()));
            }
            OutboundContent::Media { media_ref, .. } if media_ref.trim().is_empty() => {
                return Err(DispatchError::InvalidRequest("media reference is empty".to_string()));
            }
            _ => {}
        }

        if let Some(operator_id) = request.author.operator_id() {
            operator::get_operator(self.db.pool(), operator_id).await?;
        }

        Ok(())
    }
}
