use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts},
    http::{request::Parts, StatusCode},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

use crate::{
    models::auth::{AuthenticatedUser, Claims},
    services::auth::SessionError,
};

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or((StatusCode::UNAUTHORIZED, "Missing Authorization header"))?;

        let secret = parts
            .extensions
            .get::<JwtSecret>()
            .ok_or((StatusCode::INTERNAL_SERVER_ERROR, "JWT secret not configured"))?;

        decode_access_token(token, &secret.0)
            .map_err(|_| (StatusCode::UNAUTHORIZED, "Invalid or expired token"))
    }
}

/// Session-checking views treat a missing or invalid token as "no session".
impl<S> OptionalFromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        let Some(token) = bearer_token(parts) else {
            return Ok(None);
        };

        let secret = parts
            .extensions
            .get::<JwtSecret>()
            .ok_or((StatusCode::INTERNAL_SERVER_ERROR, "JWT secret not configured"))?;

        Ok(decode_access_token(token, &secret.0).ok())
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Extension type to carry the JWT secret through request extensions.
#[derive(Clone)]
pub struct JwtSecret(pub String);

pub fn decode_access_token(token: &str, secret: &str) -> Result<AuthenticatedUser, SessionError> {
    let key = DecodingKey::from_secret(secret.as_bytes());
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    // Provider tokens carry an audience we do not pin.
    validation.validate_aud = false;

    let data = decode::<Claims>(token, &key, &validation)?;
    let claims = data.claims;

    Ok(AuthenticatedUser {
        user_id: claims.sub.parse()?,
        email: claims.email,
    })
}
