//! WhatsApp Cloud API HTTP client.

use reqwest::{multipart, Client, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::config::CloudConfig;
use crate::error::CloudError;
use crate::types::{
    DownloadedMedia, MediaInfo, MediaKind, MediaSource, SendRequest, SendResponse, UploadResponse,
};

/// Client for the WhatsApp Cloud API.
#[derive(Clone)]
pub struct CloudClient {
    http: Client,
    config: CloudConfig,
}

impl CloudClient {
    /// Create a client. No request is made until the first call.
    pub fn new(config: CloudConfig) -> Result<Self, CloudError> {
        let http = Client::builder().timeout(config.timeout).build()?;

        info!(
            phone_number_id = %config.phone_number_id,
            credentials = config.access_token.is_some(),
            "WhatsApp Cloud client initialized"
        );

        Ok(Self { http, config })
    }

    /// Get the configuration.
    pub fn config(&self) -> &CloudConfig {
        &self.config
    }

    fn token(&self) -> Result<&str, CloudError> {
        self.config
            .access_token
            .as_deref()
            .ok_or(CloudError::MissingCredential("WhatsApp access token"))
    }

    /// Send a prepared message request. Returns the provider message id.
    pub async fn send(&self, request: &SendRequest) -> Result<String, CloudError> {
        let token = self.token()?;
        debug!(to = %request.to, message_type = request.message_type, "Sending message");

        let response = self
            .http
            .post(self.config.messages_url())
            .bearer_auth(token)
            .json(request)
            .send()
            .await?;

        let sent: SendResponse = parse_json(response).await?;
        let id = sent
            .message_id()
            .ok_or_else(|| CloudError::UnexpectedResponse("no message id in send response".to_string()))?
            .to_string();

        debug!(to = %request.to, wa_message_id = %id, "Message accepted");
        Ok(id)
    }

    /// Send a text message to a contact.
    pub async fn send_text(&self, to: &str, body: &str) -> Result<String, CloudError> {
        self.send(&SendRequest::text(to, body)).await
    }

    /// Send a media message to a contact.
    pub async fn send_media(
        &self,
        to: &str,
        kind: MediaKind,
        source: MediaSource,
        caption: Option<&str>,
    ) -> Result<String, CloudError> {
        let request = SendRequest::media(to, kind, source, caption.map(str::to_string));
        self.send(&request).await
    }

    /// Upload media bytes. Returns the media id usable with [`MediaSource::Id`].
    pub async fn upload_media(
        &self,
        bytes: Vec<u8>,
        mime_type: &str,
        file_name: &str,
    ) -> Result<String, CloudError> {
        let token = self.token()?;

        let file = multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(mime_type)?;
        let form = multipart::Form::new()
            .text("messaging_product", "whatsapp")
            .text("type", mime_type.to_string())
            .part("file", file);

        let response = self
            .http
            .post(self.config.media_upload_url())
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await?;

        let uploaded: UploadResponse = parse_json(response).await?;
        debug!(media_id = %uploaded.id, "Media uploaded");
        Ok(uploaded.id)
    }

    /// Download a media object by id.
    pub async fn download_media(&self, media_id: &str) -> Result<DownloadedMedia, CloudError> {
        let token = self.token()?;

        let response = self
            .http
            .get(self.config.media_url(media_id))
            .bearer_auth(token)
            .send()
            .await?;
        let info: MediaInfo = parse_json(response).await?;

        let response = check_status(
            self.http
                .get(&info.url)
                .bearer_auth(token)
                .send()
                .await?,
        )
        .await?;
        let bytes = response.bytes().await?.to_vec();

        debug!(media_id, bytes = bytes.len(), "Media downloaded");
        Ok(DownloadedMedia {
            bytes,
            mime_type: info
                .mime_type
                .unwrap_or_else(|| "application/octet-stream".to_string()),
        })
    }
}

async fn check_status(response: Response) -> Result<Response, CloudError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(CloudError::from_response(status.as_u16(), &body))
}

async fn parse_json<T: DeserializeOwned>(response: Response) -> Result<T, CloudError> {
    let body = check_status(response).await?.text().await?;
    Ok(serde_json::from_str(&body)?)
}

impl std::fmt::Debug for CloudClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudClient")
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_token_fails_before_network() {
        let client = CloudClient::new(CloudConfig::new("106540352242922")).unwrap();

        let err = client.send_text("5215551234567", "hola").await.unwrap_err();
        assert!(matches!(err, CloudError::MissingCredential(_)));
        assert!(!err.is_transient());

        let err = client.download_media("1003383421387256").await.unwrap_err();
        assert!(matches!(err, CloudError::MissingCredential(_)));
    }
}
