//! Webhook notification types.
//!
//! The payload is only parsed down to `entry[].changes[].value`; individual
//! message and status notifications are kept as raw JSON so that one
//! malformed notification can be skipped without losing its siblings.
//! Envelope fields parse leniently: a malformed entry, change, contact, or
//! metadata block is dropped on its own and never rejects the delivery.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

/// Parse a field, falling back to its default when it has the wrong shape.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(T::default());
    }
    match serde_json::from_value(value) {
        Ok(parsed) => Ok(parsed),
        Err(e) => {
            warn!(error = %e, "Ignoring malformed webhook field");
            Ok(T::default())
        }
    }
}

/// Parse a list, keeping the elements that parse. Anything other than an
/// array yields an empty list.
fn lenient_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let items = match Value::deserialize(deserializer)? {
        Value::Array(items) => items,
        Value::Null => return Ok(Vec::new()),
        other => {
            warn!(kind = json_kind(&other), "Ignoring webhook list of the wrong type");
            return Ok(Vec::new());
        }
    };

    Ok(items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                warn!(error = %e, "Skipping malformed webhook element");
                None
            }
        })
        .collect())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A webhook delivery from the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookPayload {
    /// Object type (`whatsapp_business_account`).
    #[serde(default, deserialize_with = "lenient")]
    pub object: String,

    #[serde(default, deserialize_with = "lenient_vec")]
    pub entry: Vec<Entry>,
}

impl WebhookPayload {
    /// All change values of the `messages` field, in delivery order.
    pub fn message_changes(&self) -> impl Iterator<Item = &ChangeValue> {
        self.entry
            .iter()
            .flat_map(|e| e.changes.iter())
            .filter(|c| c.field == "messages")
            .map(|c| &c.value)
    }
}

/// One business account entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    /// Business account id.
    #[serde(default, deserialize_with = "lenient")]
    pub id: String,

    #[serde(default, deserialize_with = "lenient_vec")]
    pub changes: Vec<Change>,
}

/// A change notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Change {
    /// Subscribed field; only `messages` carries chat events.
    #[serde(default, deserialize_with = "lenient")]
    pub field: String,

    #[serde(default, deserialize_with = "lenient")]
    pub value: ChangeValue,
}

/// Contents of a `messages` change.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChangeValue {
    #[serde(default, deserialize_with = "lenient")]
    pub messaging_product: Option<String>,

    #[serde(default, deserialize_with = "lenient")]
    pub metadata: Option<Metadata>,

    /// Profile data of the contacts that sent `messages`.
    #[serde(default, deserialize_with = "lenient_vec")]
    pub contacts: Vec<Contact>,

    /// Inbound message notifications, unparsed.
    #[serde(default, deserialize_with = "lenient_vec")]
    pub messages: Vec<Value>,

    /// Delivery status notifications, unparsed.
    #[serde(default, deserialize_with = "lenient_vec")]
    pub statuses: Vec<Value>,
}

impl ChangeValue {
    /// Profile name the provider supplied for a contact, if any.
    pub fn profile_name(&self, wa_id: &str) -> Option<&str> {
        self.contacts
            .iter()
            .find(|c| c.wa_id == wa_id)
            .and_then(|c| c.profile.as_ref())
            .map(|p| p.name.as_str())
            .filter(|name| !name.trim().is_empty())
    }
}

/// Business phone metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub display_phone_number: String,
    pub phone_number_id: String,
}

/// A contact referenced by a change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub wa_id: String,
    #[serde(default, deserialize_with = "lenient")]
    pub profile: Option<Profile>,
}

/// Contact profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub name: String,
}

/// An inbound message notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Provider message id (`wamid....`).
    pub id: String,

    /// Sender's contact identifier.
    pub from: String,

    /// Unix timestamp in seconds, sent as a string.
    pub timestamp: String,

    /// Message type: `text`, `image`, `audio`, `location`, ...
    #[serde(rename = "type")]
    pub message_type: String,

    #[serde(default)]
    pub text: Option<TextBody>,

    #[serde(default)]
    pub image: Option<MediaPayload>,

    #[serde(default)]
    pub audio: Option<MediaPayload>,

    #[serde(default)]
    pub video: Option<MediaPayload>,

    #[serde(default)]
    pub document: Option<MediaPayload>,

    #[serde(default)]
    pub sticker: Option<MediaPayload>,

    #[serde(default)]
    pub location: Option<Location>,
}

impl InboundMessage {
    /// Parse one raw notification from [`ChangeValue::messages`].
    pub fn from_value(value: &Value) -> Result<Self, serde_json::Error> {
        Self::deserialize(value)
    }

    /// Timestamp as seconds since the epoch.
    pub fn timestamp_secs(&self) -> Option<i64> {
        self.timestamp.trim().parse().ok()
    }

    /// Text content: the body of a text message or the caption of a media message.
    pub fn text_body(&self) -> Option<&str> {
        if let Some(text) = &self.text {
            return Some(text.body.as_str());
        }
        self.media()
            .and_then(|m| m.caption.as_deref())
            .or_else(|| self.location.as_ref().and_then(Location::describe))
    }

    /// Media attachment of any kind, if present.
    pub fn media(&self) -> Option<&MediaPayload> {
        self.image
            .as_ref()
            .or(self.audio.as_ref())
            .or(self.video.as_ref())
            .or(self.document.as_ref())
            .or(self.sticker.as_ref())
    }
}

/// Text message body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextBody {
    pub body: String,
}

/// Media attachment of an inbound message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaPayload {
    /// Media id, resolvable with the media endpoint.
    pub id: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub sha256: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    /// Set on audio recorded as a voice note.
    #[serde(default)]
    pub voice: Option<bool>,
}

/// Shared location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

impl Location {
    fn describe(&self) -> Option<&str> {
        self.name.as_deref().or(self.address.as_deref())
    }
}

/// A delivery status notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusNotification {
    /// Provider id of the outbound message this status refers to.
    pub id: String,

    /// `sent`, `delivered`, `read`, or `failed`.
    pub status: String,

    #[serde(default)]
    pub timestamp: Option<String>,

    #[serde(default)]
    pub recipient_id: Option<String>,

    /// Error details on `failed`.
    #[serde(default)]
    pub errors: Vec<Value>,
}

impl StatusNotification {
    /// Parse one raw notification from [`ChangeValue::statuses`].
    pub fn from_value(value: &Value) -> Result<Self, serde_json::Error> {
        Self::deserialize(value)
    }
}
