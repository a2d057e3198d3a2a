//! Provider webhook: subscription handshake and event delivery.

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tracing::{debug, info, warn};
use whatsapp_cloud::{verify_signature, verify_subscription, WebhookPayload};

use crate::state::{AppState, WebhookAuth};

/// Header carrying the payload signature.
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

/// Query parameters of the subscription handshake.
#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// Echo the challenge when the handshake token matches.
pub async fn verify(State(state): State<AppState>, Query(query): Query<VerifyQuery>) -> Response {
    let challenge = verify_subscription(
        query.mode.as_deref(),
        query.verify_token.as_deref(),
        query.challenge.as_deref(),
        &state.webhook.verify_token,
    );

    match challenge {
        Some(challenge) => {
            info!("Webhook subscription verified");
            (StatusCode::OK, challenge.to_string()).into_response()
        }
        None => {
            warn!(mode = ?query.mode, "Webhook verification rejected");
            StatusCode::FORBIDDEN.into_response()
        }
    }
}

/// Accept a delivery and process it in the background.
///
/// The provider retries anything that is not acknowledged quickly, so the
/// response is always `200`; deliveries that fail authentication or parsing
/// are logged and dropped.
pub async fn receive(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> StatusCode {
    if let Some(payload) = accept_delivery(&state.webhook, &headers, &body) {
        let pipeline = state.pipeline.clone();
        tokio::spawn(async move {
            let report = pipeline.ingestor().ingest(&payload).await;
            debug!(
                stored = report.stored(),
                duplicates = report.duplicates(),
                notifications = report.outcomes.len(),
                "Webhook delivery processed"
            );
        });
    }

    StatusCode::OK
}

/// Authenticate and parse a delivery body.
pub fn accept_delivery(auth: &WebhookAuth, headers: &HeaderMap, body: &[u8]) -> Option<WebhookPayload> {
    if let Some(secret) = auth.app_secret.as_deref() {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|value| value.to_str().ok());
        match signature {
            Some(signature) if verify_signature(body, signature, secret) => {}
            Some(_) => {
                warn!("Dropping webhook delivery with invalid signature");
                return None;
            }
            None => {
                warn!("Dropping unsigned webhook delivery");
                return None;
            }
        }
    }

    match serde_json::from_slice::<WebhookPayload>(body) {
        Ok(payload) => Some(payload),
        Err(e) => {
            warn!(error = %e, "Dropping unparseable webhook delivery");
            None
        }
    }
}
