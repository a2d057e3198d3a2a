//! Database models.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};
use thiserror::Error;

/// A stored text column held a value outside its enum.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseEnumError {
    /// Enum being parsed.
    pub kind: &'static str,
    /// Offending value.
    pub value: String,
}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Whether a message was received from or sent to the contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::In => "in",
            Direction::Out => "out",
        }
    }
}

impl FromStr for Direction {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in" => Ok(Direction::In),
            "out" => Ok(Direction::Out),
            other => Err(ParseEnumError::new("direction", other)),
        }
    }
}

/// Kind of content carried by a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Text,
    Image,
    Audio,
    Location,
    Other,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Text => "text",
            ContentType::Image => "image",
            ContentType::Audio => "audio",
            ContentType::Location => "location",
            ContentType::Other => "other",
        }
    }
}

impl FromStr for ContentType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(ContentType::Text),
            "image" => Ok(ContentType::Image),
            "audio" => Ok(ContentType::Audio),
            "location" => Ok(ContentType::Location),
            "other" => Ok(ContentType::Other),
            other => Err(ParseEnumError::new("content type", other)),
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery status of a message.
///
/// Variants are declared in lattice order, so `Ord` compares progress:
/// `Received < Sent < Delivered < Read`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Received,
    Sent,
    Delivered,
    Read,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Received => "received",
            MessageStatus::Sent => "sent",
            MessageStatus::Delivered => "delivered",
            MessageStatus::Read => "read",
        }
    }

    /// Position in the status lattice.
    pub fn rank(&self) -> i64 {
        match self {
            MessageStatus::Received => 0,
            MessageStatus::Sent => 1,
            MessageStatus::Delivered => 2,
            MessageStatus::Read => 3,
        }
    }
}

impl FromStr for MessageStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "received" => Ok(MessageStatus::Received),
            "sent" => Ok(MessageStatus::Sent),
            "delivered" => Ok(MessageStatus::Delivered),
            "read" => Ok(MessageStatus::Read),
            other => Err(ParseEnumError::new("message status", other)),
        }
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order / fulfillment status tracked per conversation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    None,
    Pending,
    Ready,
    Delivered,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::None => "none",
            OrderStatus::Pending => "pending",
            OrderStatus::Ready => "ready",
            OrderStatus::Delivered => "delivered",
        }
    }
}

impl FromStr for OrderStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(OrderStatus::None),
            "pending" => Ok(OrderStatus::Pending),
            "ready" => Ok(OrderStatus::Ready),
            "delivered" => Ok(OrderStatus::Delivered),
            other => Err(ParseEnumError::new("order status", other)),
        }
    }
}

fn decode_enum<T>(row: &SqliteRow, column: &str) -> sqlx::Result<T>
where
    T: FromStr<Err = ParseEnumError>,
{
    let raw: String = row.try_get(column)?;
    raw.parse().map_err(|e: ParseEnumError| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}

/// One external contact's thread and its state flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: i64,
    /// External contact identifier (phone number).
    pub wa_id: String,
    /// Profile name from the provider, last seen wins.
    pub display_name: Option<String>,
    pub pinned: bool,
    pub label_id: Option<i64>,
    pub order_status: OrderStatus,
    pub automation_disabled: bool,
    pub needs_human_attention: bool,
    pub should_call: bool,
    pub assigned_operator_id: Option<i64>,
    /// Summary of the most recently stored message.
    pub last_message: Option<String>,
    /// Unix seconds of the most recently stored message.
    pub last_message_at: Option<i64>,
    /// Id of the message `last_message` summarizes.
    pub last_message_id: Option<i64>,
    pub last_follow_up_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl<'r> FromRow<'r, SqliteRow> for Conversation {
    fn from_row(row: &'r SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            wa_id: row.try_get("wa_id")?,
            display_name: row.try_get("display_name")?,
            pinned: row.try_get("pinned")?,
            label_id: row.try_get("label_id")?,
            order_status: decode_enum(row, "order_status")?,
            automation_disabled: row.try_get("automation_disabled")?,
            needs_human_attention: row.try_get("needs_human_attention")?,
            should_call: row.try_get("should_call")?,
            assigned_operator_id: row.try_get("assigned_operator_id")?,
            last_message: row.try_get("last_message")?,
            last_message_at: row.try_get("last_message_at")?,
            last_message_id: row.try_get("last_message_id")?,
            last_follow_up_at: row.try_get("last_follow_up_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// A stored inbound or outbound message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub conversation_id: i64,
    /// Provider-assigned message id; the idempotency key when present.
    pub wa_message_id: Option<String>,
    pub direction: Direction,
    pub content_type: ContentType,
    pub body: Option<String>,
    /// Provider media id or link.
    pub media_ref: Option<String>,
    pub status: MessageStatus,
    /// Whether automation authored this (outbound) message.
    pub automated: bool,
    /// Operator who sent this (outbound) message.
    pub operator_id: Option<i64>,
    /// Unix seconds reported by the provider.
    pub timestamp: i64,
    /// Original notification JSON, kept for diagnostics.
    pub raw_payload: Option<String>,
    pub created_at: String,
}

impl<'r> FromRow<'r, SqliteRow> for Message {
    fn from_row(row: &'r SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            conversation_id: row.try_get("conversation_id")?,
            wa_message_id: row.try_get("wa_message_id")?,
            direction: decode_enum(row, "direction")?,
            content_type: decode_enum(row, "content_type")?,
            body: row.try_get("body")?,
            media_ref: row.try_get("media_ref")?,
            status: decode_enum(row, "status")?,
            automated: row.try_get("automated")?,
            operator_id: row.try_get("operator_id")?,
            timestamp: row.try_get("timestamp")?,
            raw_payload: row.try_get("raw_payload")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl Message {
    /// Short text used for list views and model history.
    pub fn summary(&self) -> String {
        summarize(self.content_type, self.body.as_deref())
    }
}

/// Summarize message content: the body when present, otherwise a
/// bracketed content-type marker such as `[image]`.
pub fn summarize(content_type: ContentType, body: Option<&str>) -> String {
    match body.map(str::trim) {
        Some(text) if !text.is_empty() => match content_type {
            ContentType::Text => text.to_string(),
            other => format!("[{}] {}", other, text),
        },
        _ => format!("[{}]", content_type),
    }
}

/// Fields for a message about to be stored.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub conversation_id: i64,
    pub wa_message_id: Option<String>,
    pub direction: Direction,
    pub content_type: ContentType,
    pub body: Option<String>,
    pub media_ref: Option<String>,
    pub status: MessageStatus,
    pub automated: bool,
    pub operator_id: Option<i64>,
    pub timestamp: i64,
    pub raw_payload: Option<String>,
}

/// A human operator (agent).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Operator {
    pub id: i64,
    pub username: String,
    pub display_name: String,
    #[serde(skip_serializing, default)]
    pub credential_hash: String,
    pub active: bool,
    /// Relative share of new-conversation assignments (>= 1).
    pub weight: i64,
    pub created_at: String,
}

/// Current assignment load of an active operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow)]
pub struct OperatorLoad {
    pub operator_id: i64,
    pub weight: i64,
    /// Conversations currently assigned to the operator.
    pub assigned: i64,
}

/// Process-wide automation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct AutomationSettings {
    pub enabled: bool,
    /// Instruction text (system prompt).
    pub instructions: String,
    /// Supplementary catalog / product text.
    pub knowledge: String,
    pub model: String,
    pub max_tokens: i64,
    pub temperature: f64,
    /// Prior messages included as context.
    pub history_depth: i64,
    pub audio_replies: bool,
    pub voice: String,
    pub voice_speed: f64,
    pub learning_enabled: bool,
    #[serde(default)]
    pub updated_at: String,
}

/// One automated reply attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct AutomationLogEntry {
    pub id: i64,
    pub conversation_id: Option<i64>,
    pub inbound_text: String,
    pub reply: Option<String>,
    pub tokens_used: i64,
    pub success: bool,
    pub error: Option<String>,
    pub created_at: String,
}

/// Operator-curated guidance appended to reply instructions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct LearnedRule {
    pub id: i64,
    pub rule: String,
    pub active: bool,
    pub source_conversation_id: Option<i64>,
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_lattice_order() {
        assert!(MessageStatus::Received < MessageStatus::Sent);
        assert!(MessageStatus::Sent < MessageStatus::Delivered);
        assert!(MessageStatus::Delivered < MessageStatus::Read);
        assert_eq!(MessageStatus::Read.rank(), 3);
    }

    #[test]
    fn test_enum_parse() {
        assert_eq!("read".parse::<MessageStatus>(), Ok(MessageStatus::Read));
        assert_eq!("pending".parse::<OrderStatus>(), Ok(OrderStatus::Pending));
        assert!("failed".parse::<MessageStatus>().is_err());
        assert!("video".parse::<ContentType>().is_err());
    }

    #[test]
    fn test_summarize() {
        assert_eq!(summarize(ContentType::Text, Some("hola")), "hola");
        assert_eq!(summarize(ContentType::Image, None), "[image]");
        assert_eq!(summarize(ContentType::Image, Some("  ")), "[image]");
        assert_eq!(
            summarize(ContentType::Image, Some("mira esto")),
            "[image] mira esto"
        );
        assert_eq!(summarize(ContentType::Audio, None), "[audio]");
    }
}
