//! The external channel seam.

use async_trait::async_trait;
use database::ContentType;
use whatsapp_cloud::{CloudClient, CloudError, DownloadedMedia, MediaKind, MediaSource};

/// Content of an outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundContent {
    /// Plain text.
    Text(String),
    /// Media by provider id or link, with an optional caption.
    Media {
        kind: MediaKind,
        media_ref: String,
        caption: Option<String>,
    },
}

impl OutboundContent {
    /// Create a text message.
    pub fn text(body: impl Into<String>) -> Self {
        OutboundContent::Text(body.into())
    }

    /// Stored content type.
    pub fn content_type(&self) -> ContentType {
        match self {
            OutboundContent::Text(_) => ContentType::Text,
            OutboundContent::Media { kind, .. } => match kind {
                MediaKind::Image => ContentType::Image,
                MediaKind::Audio => ContentType::Audio,
                MediaKind::Video | MediaKind::Document => ContentType::Other,
            },
        }
    }

    /// Stored text body: the text, or the media caption.
    pub fn body(&self) -> Option<&str> {
        match self {
            OutboundContent::Text(text) => Some(text),
            OutboundContent::Media { caption, .. } => caption.as_deref(),
        }
    }

    /// Stored media reference.
    pub fn media_ref(&self) -> Option<&str> {
        match self {
            OutboundContent::Text(_) => None,
            OutboundContent::Media { media_ref, .. } => Some(media_ref),
        }
    }
}

/// Transport to the external messaging provider.
///
/// Abstracted so the pipeline can run against the Cloud API or a test double.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Submit a message. Returns the provider-assigned message id.
    async fn send(&self, to: &str, content: &OutboundContent) -> Result<String, CloudError>;

    /// Upload media bytes. Returns a media reference usable in [`OutboundContent::Media`].
    async fn upload_media(&self, bytes: Vec<u8>, mime_type: &str) -> Result<String, CloudError> {
        let _ = (bytes, mime_type);
        Err(CloudError::UnexpectedResponse(
            "media upload is not supported by this channel".to_string(),
        ))
    }

    /// Download media by reference.
    async fn fetch_media(&self, media_ref: &str) -> Result<DownloadedMedia, CloudError> {
        let _ = media_ref;
        Err(CloudError::UnexpectedResponse(
            "media download is not supported by this channel".to_string(),
        ))
    }
}

#[async_trait]
impl Channel for CloudClient {
    async fn send(&self, to: &str, content: &OutboundContent) -> Result<String, CloudError> {
        match content {
            OutboundContent::Text(body) => self.send_text(to, body).await,
            OutboundContent::Media {
                kind,
                media_ref,
                caption,
            } => {
                self.send_media(to, *kind, MediaSource::parse(media_ref), caption.as_deref())
                    .await
            }
        }
    }

    async fn upload_media(&self, bytes: Vec<u8>, mime_type: &str) -> Result<String, CloudError> {
        let file_name = match mime_type.split(';').next().unwrap_or_default().trim() {
            "audio/ogg" => "reply.ogg",
            "audio/mpeg" => "reply.mp3",
            "image/png" => "image.png",
            "image/jpeg" => "image.jpg",
            _ => "upload.bin",
        };
        CloudClient::upload_media(self, bytes, mime_type, file_name).await
    }

    async fn fetch_media(&self, media_ref: &str) -> Result<DownloadedMedia, CloudError> {
        self.download_media(media_ref).await
    }
}
