//! Push delivery through the OneSignal REST API.
//!
//! One call targets exactly one device. Outcomes are logged here; callers
//! receive the error only to count it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use notifier_core::error::GatewayError;
use notifier_core::message::NOTIFICATION_HEADING;
use notifier_core::models::Device;
use serde::Serialize;
use tracing::{error, info};

// ── NotificationGateway ───────────────────────────────────────────────────────

/// Delivers a single message to a single device.
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    async fn send(&self, message: &str, device: &Device) -> Result<(), GatewayError>;
}

#[async_trait]
impl<T: NotificationGateway + ?Sized> NotificationGateway for Arc<T> {
    async fn send(&self, message: &str, device: &Device) -> Result<(), GatewayError> {
        (**self).send(message, device).await
    }
}

// ── GatewayConfig ─────────────────────────────────────────────────────────────

/// Credentials and endpoint for the push provider.
#[derive(Clone)]
pub struct GatewayConfig {
    pub api_url: String,
    pub app_id: String,
    pub api_key: String,
    /// Bound on a single request, including the response body.
    pub request_timeout: Duration,
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("api_url", &self.api_url)
            .field("app_id", &self.app_id)
            .field("api_key", &"<redacted>")
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

// ── Wire payload ──────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct LocalizedText<'a> {
    en: &'a str,
}

#[derive(Debug, Serialize)]
struct NotificationPayload<'a> {
    app_id: &'a str,
    include_player_ids: [&'a Device; 1],
    headings: LocalizedText<'a>,
    contents: LocalizedText<'a>,
}

// ── OneSignalGateway ──────────────────────────────────────────────────────────

/// [`NotificationGateway`] that POSTs to OneSignal.
pub struct OneSignalGateway {
    client: reqwest::Client,
    config: GatewayConfig,
}

impl OneSignalGateway {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        Ok(Self { client, config })
    }

    /// Build the request for one (message, device) pair without sending it.
    fn build_request(&self, message: &str, device: &Device) -> Result<reqwest::Request, GatewayError> {
        let payload = NotificationPayload {
            app_id: &self.config.app_id,
            include_player_ids: [device],
            headings: LocalizedText {
                en: NOTIFICATION_HEADING,
            },
            contents: LocalizedText { en: message },
        };

        // `json` keeps a content type that is already set.
        self.client
            .post(&self.config.api_url)
            .header(reqwest::header::CONTENT_TYPE, "application/json; charset=utf-8")
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Basic {}", self.config.api_key),
            )
            .json(&payload)
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))
    }

    async fn deliver(&self, message: &str, device: &Device) -> Result<(), GatewayError> {
        let request = self.build_request(message, device)?;
        let response = self.client.execute(request).await.map_err(classify)?;

        let status = response.status();
        if status == reqwest::StatusCode::OK {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(GatewayError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl NotificationGateway for OneSignalGateway {
    async fn send(&self, message: &str, device: &Device) -> Result<(), GatewayError> {
        match self.deliver(message, device).await {
            Ok(()) => {
                info!(device = %device, "notification sent");
                Ok(())
            }
            Err(e) => {
                error!(device = %device, error = %e, "notification failed");
                Err(e)
            }
        }
    }
}

fn classify(e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::Timeout
    } else {
        GatewayError::Transport(e.to_string())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
