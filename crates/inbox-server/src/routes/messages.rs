//! Message routes: paging history and operator sends.

use axum::extract::{Path, Query, State};
use axum::Json;
use database::{conversation, message, Message};
use orchestrator::{Author, DispatchRequest, DispatchedMessage, OutboundContent};
use serde::Deserialize;
use tracing::info;
use whatsapp_cloud::MediaKind;

use crate::error::{AppError, Result};
use crate::state::AppState;

const DEFAULT_PAGE_SIZE: i64 = 50;

/// Paging parameters.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub limit: Option<i64>,
    /// Only messages with an id below this one.
    pub before: Option<i64>,
}

/// Media part of a send request.
#[derive(Debug, Deserialize)]
pub struct MediaRequest {
    pub kind: MediaKind,
    /// Provider media id or public link.
    pub media_ref: String,
    #[serde(default)]
    pub caption: Option<String>,
}

/// What an operator wants to send. Exactly one of `text` and `media`.
#[derive(Debug, Deserialize)]
pub struct SendRequest {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub media: Option<MediaRequest>,
    #[serde(default)]
    pub operator_id: Option<i64>,
}

impl SendRequest {
    fn content(self) -> Result<(OutboundContent, Author)> {
        let author = Author::Operator(self.operator_id);
        let content = match (self.text, self.media) {
            (Some(text), None) => OutboundContent::Text(text),
            (None, Some(media)) => OutboundContent::Media {
                kind: media.kind,
                media_ref: media.media_ref,
                caption: media.caption,
            },
            _ => {
                return Err(AppError::BadRequest(
                    "exactly one of text and media is required".to_string(),
                ))
            }
        };
        Ok((content, author))
    }
}

/// Send request addressed by contact identifier.
#[derive(Debug, Deserialize)]
pub struct ContactSendRequest {
    pub to: String,
    #[serde(flatten)]
    pub message: SendRequest,
}

/// Page through a conversation's messages, oldest first.
pub async fn list(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Vec<Message>>> {
    let pool = state.db.pool();
    conversation::get_conversation(pool, id).await?;

    let limit = page.limit.unwrap_or(DEFAULT_PAGE_SIZE);
    if limit <= 0 {
        return Err(AppError::BadRequest("limit must be positive".to_string()));
    }

    let messages = message::list_messages(pool, id, page.before, limit).await?;
    Ok(Json(messages))
}

/// Operator send into an existing conversation.
pub async fn send_to_conversation(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<SendRequest>,
) -> Result<Json<DispatchedMessage>> {
    let (content, author) = req.content()?;
    let sent = state
        .pipeline
        .dispatcher()
        .dispatch_to_conversation(id, content, author)
        .await?;

    info!(conversation_id = id, message_id = sent.message.id, "Operator message sent");
    Ok(Json(sent))
}

/// Operator send to any contact, creating the conversation when needed.
pub async fn send_to_contact(
    State(state): State<AppState>,
    Json(req): Json<ContactSendRequest>,
) -> Result<Json<DispatchedMessage>> {
    let (content, author) = req.message.content()?;
    let sent = state
        .pipeline
        .dispatcher()
        .dispatch(DispatchRequest::new(req.to, content, author))
        .await?;

    info!(
        conversation_id = sent.conversation_id,
        created = sent.created_conversation,
        "Operator message sent"
    );
    Ok(Json(sent))
}
