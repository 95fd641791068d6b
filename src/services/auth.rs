use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use thiserror::Error;
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use crate::{
    middleware::auth::decode_access_token,
    models::auth::{AuthEvent, AuthEventKind, AuthenticatedUser, Claims},
};

#[derive(Debug, Error)]
pub enum SessionError {
    /// Bad signature, expired, or not a JWT at all; `kind()` tells which.
    #[error("invalid session token: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("session subject is not a user id: {0}")]
    InvalidSubject(#[from] uuid::Error),
}

/// Mint an HS256 access token the same shape the identity provider issues.
pub fn issue_session_token(
    user_id: Uuid,
    email: &str,
    secret: &str,
    ttl_seconds: u64,
) -> Result<String, SessionError> {
    let now = Utc::now().timestamp() as usize;
    let claims = Claims {
        sub: user_id.to_string(),
        email: email.to_string(),
        iat: now,
        exp: now + ttl_seconds as usize,
    };
    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok(token)
}

/// Source of the current session and its change notifications.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn current_session(&self) -> Option<AuthenticatedUser>;

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;
}

/// Session provider backed by provider-issued bearer tokens.
///
/// The HTTP views build one per request with [`TokenSessionProvider::with_session`], so
/// there the session never changes while the view is mounted and no events fire.
/// `sign_in`/`sign_out` drive the change stream for long-lived views that own a provider.
pub struct TokenSessionProvider {
    secret: String,
    session: RwLock<Option<AuthenticatedUser>>,
    events: broadcast::Sender<AuthEvent>,
}

impl TokenSessionProvider {
    pub fn new(secret: impl Into<String>) -> Self {
        Self::with_session(secret, None)
    }

    /// Provider seeded with an already validated session (e.g. from a request extractor).
    pub fn with_session(secret: impl Into<String>, session: Option<AuthenticatedUser>) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            secret: secret.into(),
            session: RwLock::new(session),
            events,
        }
    }

    pub async fn sign_in(&self, token: &str) -> Result<AuthenticatedUser, SessionError> {
        let user = decode_access_token(token, &self.secret)?;
        let kind = {
            let mut session = self.session.write().await;
            let kind = if session.is_some() {
                AuthEventKind::TokenRefreshed
            } else {
                AuthEventKind::SignedIn
            };
            *session = Some(user.clone());
            kind
        };
        tracing::info!("Session established for {}", user.email);
        self.publish(kind, Some(user.clone()));
        Ok(user)
    }

    pub async fn sign_out(&self) {
        let previous = self.session.write().await.take();
        if let Some(user) = previous {
            tracing::info!("Signed out {}", user.email);
        }
        self.publish(AuthEventKind::SignedOut, None);
    }

    fn publish(&self, kind: AuthEventKind, session: Option<AuthenticatedUser>) {
        // No subscribers is fine: nobody is watching this provider.
        let _ = self.events.send(AuthEvent { kind, session });
    }
}

#[async_trait]
impl SessionProvider for TokenSessionProvider {
    async fn current_session(&self) -> Option<AuthenticatedUser> {
        self.session.read().await.clone()
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}
