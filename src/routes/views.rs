use std::sync::Arc;

use axum::{extract::State, Json};

use crate::{
    models::{auth::AuthenticatedUser, contact::NavigationResponse},
    services::{
        auth::TokenSessionProvider,
        session_guard::{mount_dashboard, mount_landing, DashboardMount, NavigationLog},
    },
    AppState,
};

/// GET /api/landing
pub async fn landing(
    State(state): State<AppState>,
    session: Option<AuthenticatedUser>,
) -> Json<NavigationResponse> {
    let provider = TokenSessionProvider::with_session(state.config.auth_jwt_secret.clone(), session);
    let nav = Arc::new(NavigationLog::default());

    // Request-scoped view: the listener is torn down when this handler returns.
    let _subscription = mount_landing(&provider, nav.clone()).await;

    Json(NavigationResponse {
        redirect: nav.last().map(|v| v.path()),
        email: None,
        whatsapp: None,
    })
}

/// GET /api/dashboard
pub async fn dashboard(
    State(state): State<AppState>,
    session: Option<AuthenticatedUser>,
) -> Json<NavigationResponse> {
    let provider = TokenSessionProvider::with_session(state.config.auth_jwt_secret.clone(), session);
    let nav = Arc::new(NavigationLog::default());

    match mount_dashboard(&provider, state.contacts.as_ref(), nav.clone()).await {
        DashboardMount::Redirected => Json(NavigationResponse {
            redirect: nav.last().map(|v| v.path()),
            email: None,
            whatsapp: None,
        }),
        DashboardMount::Ready { email, whatsapp, .. } => Json(NavigationResponse {
            redirect: None,
            email: Some(email),
            whatsapp: Some(whatsapp.unwrap_or_default()),
        }),
    }
}
