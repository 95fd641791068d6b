use async_trait::async_trait;
use axum::{
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use reqwest::Client;
use serde_json::json;
use thiserror::Error;

use crate::{models::contact::NotifyPayload, services::metrics};

/// Headers attached to every dispatcher response, preflight included.
pub const CORS_HEADERS: [(HeaderName, &str); 2] = [
    (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
    (
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        "authorization, x-client-info, apikey, content-type",
    ),
];

pub const SUCCESS_MESSAGE: &str = "Data sent to n8n successfully";

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Webhook URL not configured")]
    ConfigMissing,
    /// Carries the upstream status for logs; callers only ever see the fixed message.
    #[error("Failed to send to n8n")]
    UpstreamRejected(u16),
    #[error("{0}")]
    TransportFailure(String),
    #[error("{0}")]
    MalformedPayload(String),
}

impl DispatchError {
    pub fn label(&self) -> &'static str {
        match self {
            DispatchError::ConfigMissing => "config_missing",
            DispatchError::UpstreamRejected(_) => "upstream_rejected",
            DispatchError::TransportFailure(_) => "transport_failure",
            DispatchError::MalformedPayload(_) => "malformed_payload",
        }
    }
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        let message = match self.to_string() {
            m if m.is_empty() => "Unknown error occurred".to_string(),
            m => m,
        };
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            CORS_HEADERS,
            Json(json!({ "error": message })),
        )
            .into_response()
    }
}

/// Second step of a submission: propagate a saved contact to the automation side.
#[async_trait]
pub trait Forwarder: Send + Sync {
    async fn forward(&self, payload: &NotifyPayload) -> Result<(), DispatchError>;
}

/// Relays contact payloads to the configured n8n webhook. One attempt per call.
pub struct NotificationDispatcher {
    client: Client,
    webhook_url: Option<String>,
}

impl NotificationDispatcher {
    pub fn new(webhook_url: Option<String>) -> Self {
        Self {
            client: Client::new(),
            webhook_url,
        }
    }

    /// Entry point for the HTTP function: configuration is checked before the body is parsed.
    pub async fn dispatch_raw(&self, body: &[u8]) -> Result<(), DispatchError> {
        let result = async {
            let url = self.webhook_url()?;
            let payload: NotifyPayload = serde_json::from_slice(body)
                .map_err(|e| DispatchError::MalformedPayload(e.to_string()))?;
            self.send(url, &payload).await
        }
        .await;
        observe(result)
    }

    pub async fn relay(&self, payload: &NotifyPayload) -> Result<(), DispatchError> {
        let result = match self.webhook_url() {
            Ok(url) => self.send(url, payload).await,
            Err(e) => Err(e),
        };
        observe(result)
    }

    fn webhook_url(&self) -> Result<&str, DispatchError> {
        self.webhook_url.as_deref().ok_or_else(|| {
            tracing::error!("N8N_WEBHOOK_URL not configured");
            DispatchError::ConfigMissing
        })
    }

    async fn send(&self, url: &str, payload: &NotifyPayload) -> Result<(), DispatchError> {
        tracing::info!(
            "Processing notification for email: {}, whatsapp: {}",
            payload.email,
            payload.whatsapp
        );

        let response = self
            .client
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Error in notify-n8n relay: {e}");
                DispatchError::TransportFailure(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!("n8n webhook failed with status: {}", status.as_u16());
            return Err(DispatchError::UpstreamRejected(status.as_u16()));
        }

        tracing::info!("Successfully sent data to n8n for {}", payload.email);
        Ok(())
    }
}

fn observe(result: Result<(), DispatchError>) -> Result<(), DispatchError> {
    match &result {
        Ok(()) => metrics::record_dispatch("success"),
        Err(e) => metrics::record_dispatch(e.label()),
    }
    result
}

#[async_trait]
impl Forwarder for NotificationDispatcher {
    async fn forward(&self, payload: &NotifyPayload) -> Result<(), DispatchError> {
        self.relay(payload).await
    }
}

/// Forwards through a separately deployed notify-n8n function.
pub struct HttpForwarder {
    client: Client,
    function_url: String,
}

impl HttpForwarder {
    pub fn new(function_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            function_url: function_url.into(),
        }
    }
}

#[async_trait]
impl Forwarder for HttpForwarder {
    async fn forward(&self, payload: &NotifyPayload) -> Result<(), DispatchError> {
        let response = self
            .client
            .post(&self.function_url)
            .json(payload)
            .send()
            .await
            .map_err(|e| DispatchError::TransportFailure(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            tracing::warn!("notify function error {}: {}", status, text);
            return Err(DispatchError::UpstreamRejected(status.as_u16()));
        }
        Ok(())
    }
}
