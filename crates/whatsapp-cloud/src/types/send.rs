//! Types for sending messages through the Cloud API.

use serde::{Deserialize, Serialize};

/// Kind of media attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Audio,
    Video,
    Document,
}

impl MediaKind {
    /// Message `type` value.
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
            MediaKind::Document => "document",
        }
    }

    /// Whether the provider accepts a caption for this kind.
    pub fn supports_caption(&self) -> bool {
        !matches!(self, MediaKind::Audio)
    }
}

/// Reference to media: a previously uploaded id or a public link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaSource {
    Id(String),
    Link(String),
}

impl MediaSource {
    /// Interpret a stored media reference: URLs are links, anything else an id.
    pub fn parse(reference: &str) -> Self {
        if reference.starts_with("http://") || reference.starts_with("https://") {
            MediaSource::Link(reference.to_string())
        } else {
            MediaSource::Id(reference.to_string())
        }
    }

    /// The raw reference.
    pub fn as_str(&self) -> &str {
        match self {
            MediaSource::Id(s) | MediaSource::Link(s) => s,
        }
    }
}

/// Media object of an outbound message.
#[derive(Debug, Clone, Serialize)]
pub struct MediaObject {
    #[serde(flatten)]
    pub source: MediaSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

/// Text object of an outbound message.
#[derive(Debug, Clone, Serialize)]
pub struct TextObject {
    pub preview_url: bool,
    pub body: String,
}

/// Body of a send-message request.
#[derive(Debug, Clone, Serialize)]
pub struct SendRequest {
    pub messaging_product: &'static str,
    pub recipient_type: &'static str,
    pub to: String,
    #[serde(rename = "type")]
    pub message_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<TextObject>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<MediaObject>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<MediaObject>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<MediaObject>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<MediaObject>,
}

impl SendRequest {
    fn base(to: impl Into<String>, message_type: &'static str) -> Self {
        Self {
            messaging_product: "whatsapp",
            recipient_type: "individual",
            to: to.into(),
            message_type,
            text: None,
            image: None,
            audio: None,
            video: None,
            document: None,
        }
    }

    /// Create a text message request.
    pub fn text(to: impl Into<String>, body: impl Into<String>) -> Self {
        let mut request = Self::base(to, "text");
        request.text = Some(TextObject {
            preview_url: false,
            body: body.into(),
        });
        request
    }

    /// Create a media message request. Captions are dropped for audio.
    pub fn media(
        to: impl Into<String>,
        kind: MediaKind,
        source: MediaSource,
        caption: Option<String>,
    ) -> Self {
        let mut request = Self::base(to, kind.as_str());
        let object = MediaObject {
            source,
            caption: caption.filter(|c| kind.supports_caption() && !c.is_empty()),
        };
        match kind {
            MediaKind::Image => request.image = Some(object),
            MediaKind::Audio => request.audio = Some(object),
            MediaKind::Video => request.video = Some(object),
            MediaKind::Document => request.document = Some(object),
        }
        request
    }
}

/// Response to a send-message request.
#[derive(Debug, Clone, Deserialize)]
pub struct SendResponse {
    #[serde(default)]
    pub messages: Vec<SentMessage>,
}

impl SendResponse {
    /// Provider id assigned to the sent message.
    pub fn message_id(&self) -> Option<&str> {
        self.messages.first().map(|m| m.id.as_str())
    }
}

/// One accepted message.
#[derive(Debug, Clone, Deserialize)]
pub struct SentMessage {
    pub id: String,
}

/// Response to a media upload.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadResponse {
    pub id: String,
}

/// Metadata of a media object.
#[derive(Debug, Clone, Deserialize)]
pub struct MediaInfo {
    /// Short-lived download URL (requires the access token).
    pub url: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub file_size: Option<u64>,
}

/// Downloaded media.
#[derive(Debug, Clone)]
pub struct DownloadedMedia {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}
