//! Identity resolution.
//!
//! The caller is identified by an `Authorization: Bearer <token>` header whose
//! token was issued by one of the sign-in endpoints.  Handlers receive the
//! result as a [`Caller`] and pass the user id on explicitly.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;

use huddle_shared::UserId;

use crate::api::AppState;
use crate::error::ServerError;

/// The resolved caller of a request; `None` when signed out or when the
/// token is unknown.
#[derive(Debug, Clone, Copy)]
pub struct Caller(pub Option<UserId>);

impl Caller {
    /// The caller's id, or `Unauthenticated` for mutations.
    pub fn require(self) -> Result<UserId, ServerError> {
        self.0.ok_or(ServerError::Unauthenticated)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer_token(&parts.headers) else {
            return Ok(Caller(None));
        };
        let user = state.db.lock().await.resolve_session(token)?;
        Ok(Caller(user))
    }
}

/// Extract the token from an `Authorization: Bearer` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
