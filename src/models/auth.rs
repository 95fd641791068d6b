use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Claims embedded in the identity provider's access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,   // user UUID
    pub email: String,
    pub exp: usize,
    pub iat: usize,
}

/// Extracted from the validated JWT — available via Axum extractors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub email: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEventKind {
    SignedIn,
    SignedOut,
    TokenRefreshed,
}

/// Broadcast to every view subscribed to a session provider.
#[derive(Debug, Clone)]
pub struct AuthEvent {
    pub kind: AuthEventKind,
    pub session: Option<AuthenticatedUser>,
}
