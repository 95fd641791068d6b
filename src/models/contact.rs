use serde::{Deserialize, Serialize};

/// Body relayed by the notify-n8n dispatcher, both inbound and outbound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyPayload {
    pub email: String,
    pub whatsapp: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NotifySuccess {
    pub success: bool,
    pub message: String,
}

// Request/Response DTOs
#[derive(Debug, Deserialize)]
pub struct SubmitContactRequest {
    pub whatsapp: String,
}

#[derive(Debug, Serialize)]
pub struct NavigationResponse {
    pub redirect: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub whatsapp: Option<String>,
}
