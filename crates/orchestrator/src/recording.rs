//! In-memory [`Channel`] for tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use whatsapp_cloud::{CloudError, DownloadedMedia};

use crate::channel::{Channel, OutboundContent};

/// How a [`RecordingChannel`] answers sends.
#[derive(Debug, Clone)]
pub enum ChannelBehavior {
    /// Accept every message.
    Accept,
    /// Fail as if no access token were configured.
    MissingCredential,
    /// Fail with an API error.
    Reject {
        status: u16,
        code: Option<i64>,
        message: String,
    },
    /// Accept, but only after the given delay.
    Slow(Duration),
}

/// One message accepted by a [`RecordingChannel`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentRecord {
    pub to: String,
    pub content: OutboundContent,
    pub wa_message_id: String,
}

/// An in-memory channel that records what it accepts.
///
/// Accepted messages get ids `wamid.OUT.<n>`; uploads get `media.<n>`.
#[derive(Debug)]
pub struct RecordingChannel {
    behavior: Mutex<ChannelBehavior>,
    upload_behavior: Mutex<ChannelBehavior>,
    sent: Mutex<Vec<SentRecord>>,
    counter: AtomicUsize,
    uploads: AtomicUsize,
    media: Option<DownloadedMedia>,
}

impl Default for RecordingChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingChannel {
    /// Create a channel that accepts everything.
    pub fn new() -> Self {
        Self {
            behavior: Mutex::new(ChannelBehavior::Accept),
            upload_behavior: Mutex::new(ChannelBehavior::Accept),
            sent: Mutex::new(Vec::new()),
            counter: AtomicUsize::new(0),
            uploads: AtomicUsize::new(0),
            media: None,
        }
    }

    /// Create a channel with the given send behavior.
    pub fn with_behavior(behavior: ChannelBehavior) -> Self {
        let channel = Self::new();
        channel.set_behavior(behavior);
        channel
    }

    /// Serve the given bytes for every media download.
    pub fn with_media(mut self, bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        self.media = Some(DownloadedMedia {
            bytes,
            mime_type: mime_type.into(),
        });
        self
    }

    /// Change how sends are answered.
    pub fn set_behavior(&self, behavior: ChannelBehavior) {
        *self.behavior.lock().unwrap_or_else(PoisonError::into_inner) = behavior;
    }

    /// Change how uploads are answered.
    pub fn set_upload_behavior(&self, behavior: ChannelBehavior) {
        *self
            .upload_behavior
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = behavior;
    }

    /// Messages accepted so far, oldest first.
    pub fn sent(&self) -> Vec<SentRecord> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of successful uploads.
    pub fn upload_count(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    async fn apply(behavior: ChannelBehavior) -> Result<(), CloudError> {
        match behavior {
            ChannelBehavior::Accept => Ok(()),
            ChannelBehavior::Slow(delay) => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
            ChannelBehavior::MissingCredential => {
                Err(CloudError::MissingCredential("WhatsApp access token"))
            }
            ChannelBehavior::Reject {
                status,
                code,
                message,
            } => Err(CloudError::Api {
                status,
                code,
                error_type: Some("OAuthException".to_string()),
                message,
            }),
        }
    }
}

#[async_trait]
impl Channel for RecordingChannel {
    async fn send(&self, to: &str, content: &OutboundContent) -> Result<String, CloudError> {
        let behavior = self
            .behavior
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        Self::apply(behavior).await?;

        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let wa_message_id = format!("wamid.OUT.{}", n);
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(SentRecord {
                to: to.to_string(),
                content: content.clone(),
                wa_message_id: wa_message_id.clone(),
            });
        Ok(wa_message_id)
    }

    async fn upload_media(&self, _bytes: Vec<u8>, _mime_type: &str) -> Result<String, CloudError> {
        let behavior = self
            .upload_behavior
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        Self::apply(behavior).await?;

        let n = self.uploads.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("media.{}", n))
    }

    async fn fetch_media(&self, media_ref: &str) -> Result<DownloadedMedia, CloudError> {
        self.media.clone().ok_or_else(|| CloudError::Api {
            status: 404,
            code: Some(100),
            error_type: None,
            message: format!("unknown media {}", media_ref),
        })
    }
}
