use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use std::future::Future;

use crate::{
    app::AppState,
    error::OAuthError,
    models::user::User,
    security::{Claims, TokenKind},
};

/// Extractor for requests carrying `Authorization: Bearer <access_token>`.
///
/// Only access tokens minted by the token endpoint are accepted; refresh
/// tokens are rejected. The token's user must still exist.
///
/// ```ignore
/// async fn handler(BearerUser { user, .. }: BearerUser) -> String {
///     user.email
/// }
/// ```
pub struct BearerUser {
    pub claims: Claims,
    pub user: User,
}

impl FromRequestParts<AppState> for BearerUser {
    type Rejection = OAuthError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl Future<Output = Result<Self, Self::Rejection>> + Send {
        let token = bearer_token(parts);
        async move {
            let Some(token) = token else {
                return Err(OAuthError::unauthorized("Missing bearer token"));
            };

            let claims = state
                .tokens
                .verify(&token, TokenKind::Access, state.clock.now())
                .map_err(|e| {
                    tracing::debug!(error = %e, "rejected bearer token");
                    OAuthError::unauthorized("Invalid access token")
                })?;

            let user = state
                .repo
                .get_user(&claims.user_id)
                .await
                .map_err(|e| OAuthError::internal("Failed to load user", e))?
                .ok_or_else(|| OAuthError::unauthorized("User not found"))?;

            Ok(BearerUser { claims, user })
        }
    }
}

fn bearer_token(parts: &Parts) -> Option<String> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then(|| token.to_string())
}
