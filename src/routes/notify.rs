use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::{
    models::contact::NotifySuccess,
    services::dispatcher::{CORS_HEADERS, SUCCESS_MESSAGE},
    AppState,
};

/// OPTIONS /functions/v1/notify-n8n — answered before the body is looked at.
pub async fn preflight() -> impl IntoResponse {
    (StatusCode::OK, CORS_HEADERS)
}

/// POST /functions/v1/notify-n8n
pub async fn notify_n8n(State(state): State<AppState>, body: Bytes) -> Response {
    match state.dispatcher.dispatch_raw(&body).await {
        Ok(()) => (
            StatusCode::OK,
            CORS_HEADERS,
            Json(NotifySuccess {
                success: true,
                message: SUCCESS_MESSAGE.to_string(),
            }),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}
