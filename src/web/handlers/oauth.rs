use axum::{
    extract::{Query, State},
    http::{header::LOCATION, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use time::Duration;

use crate::{
    app::AppState,
    error::OAuthError,
    models::{
        authorization_code::{AuthorizationCode, CodeRedemption},
        oauth_client::{OAuthClient, GRANT_AUTHORIZATION_CODE, GRANT_REFRESH_TOKEN},
        user::User,
    },
    security::{hash_token, verify_client_secret, TokenKind, TokenPair, TokenSubject},
    web::extract::FormOrJson,
};

const AUTH_CODE_TTL_MINUTES: i64 = 10;

const AUTHORIZE_FAILED: &str = "Error processing authorization request";
const TOKEN_FAILED: &str = "Error processing token request";

#[derive(Debug, Deserialize)]
pub struct AuthorizeQuery {
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub response_type: Option<String>,
    pub scope: Option<String>,
    pub state: Option<String>,
}

#[derive(Default, Deserialize)]
pub struct TokenRequest {
    pub grant_type: Option<String>,
    pub code: Option<String>,
    pub redirect_uri: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub refresh_token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserSummary {
    pub id: String,
    pub name: Option<String>,
    pub email: String,
    pub avatar: String,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        UserSummary {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            avatar: user.avatar().to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub user: UserSummary,
}

/// `GET /oauth/authorize`: issue a code and bounce back to the client.
pub async fn authorize(
    State(state): State<AppState>,
    Query(q): Query<AuthorizeQuery>,
) -> Result<Response, OAuthError> {
    tracing::info!(
        client_id = ?q.client_id,
        redirect_uri = ?q.redirect_uri,
        response_type = ?q.response_type,
        scope = ?q.scope,
        "authorization request received"
    );

    let client_id = q.client_id.as_deref().unwrap_or_default();
    let client = load_client(&state, client_id)
        .await
        .map_err(|e| OAuthError::internal(AUTHORIZE_FAILED, e))?
        .ok_or_else(|| {
            tracing::info!(client_id, "client not found");
            OAuthError::bad_request("Invalid client ID")
        })?;

    let redirect_uri = q.redirect_uri.as_deref().unwrap_or_default();
    if !client.allows_redirect_uri(redirect_uri) {
        tracing::info!(
            provided = redirect_uri,
            allowed = ?client.redirect_uri_list(),
            "invalid redirect uri"
        );
        return Err(OAuthError::bad_request("Invalid redirect URI"));
    }

    if let Some(response_type) = q.response_type.as_deref() {
        if response_type != "code" {
            return Err(OAuthError::bad_request("Unsupported response type"));
        }
    }

    let code = uuid::Uuid::new_v4().to_string();
    let now = state.clock.now();
    let scope = non_empty(q.scope);
    let csrf_state = non_empty(q.state);
    let row = AuthorizationCode {
        code_hash: hash_token(&code),
        client_id: client.client_id.clone(),
        redirect_uri: redirect_uri.to_string(),
        scope,
        state: csrf_state.clone(),
        expires_at: (now + Duration::minutes(AUTH_CODE_TTL_MINUTES)).unix_timestamp(),
        created_at: now.unix_timestamp(),
    };
    let expires_at = row.expires_at;

    state
        .repo
        .create_authorization_code(row)
        .await
        .map_err(|e| OAuthError::internal(AUTHORIZE_FAILED, e))?;
    tracing::info!(client_id = %client.client_id, redirect_uri, expires_at, "stored authorization code");

    let mut params = vec![("code", code.as_str())];
    if let Some(s) = csrf_state.as_deref() {
        params.push(("state", s));
    }
    Ok(found(&append_query(redirect_uri, &params)))
}

/// `POST /oauth/token`: exchange a code or a refresh token for a token pair.
pub async fn token(
    State(state): State<AppState>,
    FormOrJson(req): FormOrJson<TokenRequest>,
) -> Result<Json<TokenResponse>, OAuthError> {
    let grant_type = req.grant_type.as_deref().unwrap_or_default();
    tracing::info!(grant_type, client_id = ?req.client_id, "token request received");

    let client = authenticate_client(&state, req.client_id.as_deref(), req.client_secret.as_deref()).await?;

    let response = match grant_type {
        GRANT_AUTHORIZATION_CODE => exchange_authorization_code(&state, &client, &req).await?,
        GRANT_REFRESH_TOKEN => exchange_refresh_token(&state, &client, &req).await?,
        _ => return Err(OAuthError::bad_request("Unsupported grant type")),
    };
    Ok(Json(response))
}

async fn exchange_authorization_code(
    state: &AppState,
    client: &OAuthClient,
    req: &TokenRequest,
) -> Result<TokenResponse, OAuthError> {
    let redirect_uri = req.redirect_uri.as_deref().unwrap_or_default();
    if !client.allows_redirect_uri(redirect_uri) {
        tracing::info!(
            provided = redirect_uri,
            allowed = ?client.redirect_uri_list(),
            "invalid redirect uri"
        );
        return Err(OAuthError::bad_request("Invalid redirect URI"));
    }

    // Resolved before the code is touched so a missing link does not burn it
    let user = client_owner(state, client).await?;

    let code = req
        .code
        .as_deref()
        .filter(|c| !c.is_empty())
        .ok_or_else(|| OAuthError::bad_request("Invalid authorization code"))?;

    let now = state.clock.now();
    let redemption = state
        .repo
        .redeem_authorization_code(&hash_token(code), &client.client_id, redirect_uri, now.unix_timestamp())
        .await
        .map_err(|e| OAuthError::internal(TOKEN_FAILED, e))?;

    let row = match redemption {
        CodeRedemption::Redeemed(row) => row,
        CodeRedemption::NotFound => return Err(OAuthError::bad_request("Invalid authorization code")),
        CodeRedemption::ClientMismatch => return Err(OAuthError::bad_request("Client ID mismatch")),
        CodeRedemption::RedirectMismatch => return Err(OAuthError::bad_request("Redirect URI mismatch")),
        CodeRedemption::Expired => return Err(OAuthError::bad_request("Authorization code expired")),
    };

    let subject = TokenSubject {
        client_id: client.client_id.clone(),
        scope: row.scope,
        user_id: user.id.clone(),
        email: user.email.clone(),
    };
    let pair = state
        .tokens
        .issue_pair(&subject, now)
        .map_err(|e| OAuthError::internal(TOKEN_FAILED, e))?;

    tracing::info!(client_id = %client.client_id, user_id = %user.id, "authorization code exchanged");
    Ok(token_response(pair, &user))
}

async fn exchange_refresh_token(
    state: &AppState,
    client: &OAuthClient,
    req: &TokenRequest,
) -> Result<TokenResponse, OAuthError> {
    let refresh_token = req
        .refresh_token
        .as_deref()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| OAuthError::bad_request("Refresh token is required"))?;

    let now = state.clock.now();
    let claims = state
        .tokens
        .verify(refresh_token, TokenKind::Refresh, now)
        .map_err(|e| {
            tracing::info!(client_id = %client.client_id, error = %e, "rejected refresh token");
            OAuthError::unauthorized("Invalid refresh token")
        })?;

    if claims.client_id != client.client_id {
        tracing::info!(client_id = %client.client_id, "refresh token issued to another client");
        return Err(OAuthError::unauthorized("Invalid refresh token"));
    }

    let user = state
        .repo
        .get_user(&claims.user_id)
        .await
        .map_err(|e| OAuthError::internal(TOKEN_FAILED, e))?
        .ok_or_else(|| OAuthError::unauthorized("User not found"))?;

    let subject = TokenSubject {
        client_id: client.client_id.clone(),
        scope: claims.scope,
        user_id: user.id.clone(),
        email: user.email.clone(),
    };
    let pair = state
        .tokens
        .issue_pair(&subject, now)
        .map_err(|e| OAuthError::internal(TOKEN_FAILED, e))?;

    tracing::info!(client_id = %client.client_id, user_id = %user.id, "refresh token exchanged");
    Ok(token_response(pair, &user))
}

async fn authenticate_client(
    state: &AppState,
    client_id: Option<&str>,
    client_secret: Option<&str>,
) -> Result<OAuthClient, OAuthError> {
    let client_id = client_id.unwrap_or_default();
    let client = load_client(state, client_id)
        .await
        .map_err(|e| OAuthError::internal(TOKEN_FAILED, e))?
        .ok_or_else(|| {
            tracing::info!(client_id, "client validation failed: client not found");
            OAuthError::unauthorized("Invalid client ID")
        })?;

    if !verify_client_secret(client_secret.unwrap_or_default(), &client.client_secret_hash) {
        tracing::info!(client_id, "client secret validation failed");
        return Err(OAuthError::unauthorized("Invalid client secret"));
    }

    Ok(client)
}

async fn load_client(state: &AppState, client_id: &str) -> anyhow::Result<Option<OAuthClient>> {
    if client_id.is_empty() {
        return Ok(None);
    }
    state.repo.get_client(client_id).await
}

async fn client_owner(state: &AppState, client: &OAuthClient) -> Result<User, OAuthError> {
    const NO_OWNER: &str = "No user account found for this OAuth client";
    let Some(user_id) = client.user_id.as_deref() else {
        return Err(OAuthError::unauthorized(NO_OWNER));
    };
    state
        .repo
        .get_user(user_id)
        .await
        .map_err(|e| OAuthError::internal(TOKEN_FAILED, e))?
        .ok_or_else(|| OAuthError::unauthorized(NO_OWNER))
}

fn token_response(pair: TokenPair, user: &User) -> TokenResponse {
    TokenResponse {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
        token_type: "Bearer",
        expires_in: pair.expires_in,
        user: UserSummary::from(user),
    }
}

/// Append query parameters to a registered redirect URI, leaving the URI
/// itself byte-for-byte as registered.
fn append_query(redirect_uri: &str, params: &[(&str, &str)]) -> String {
    let mut query = url::form_urlencoded::Serializer::new(String::new());
    for (k, v) in params {
        query.append_pair(k, v);
    }
    let query = query.finish();
    let separator = if redirect_uri.contains('?') { '&' } else { '?' };
    format!("{redirect_uri}{separator}{query}")
}

fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(LOCATION, location.to_string())]).into_response()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_is_appended_verbatim() {
        let loc = append_query("http://cb", &[("code", "abc-123"), ("state", "xyz")]);
        assert_eq!(loc, "http://cb?code=abc-123&state=xyz");
    }

    #[test]
    fn existing_query_is_extended() {
        let loc = append_query("http://localhost:3001/oauth?tenant=1", &[("code", "c")]);
        assert_eq!(loc, "http://localhost:3001/oauth?tenant=1&code=c");
    }

    #[test]
    fn state_is_form_encoded() {
        let loc = append_query("http://cb", &[("state", "a b&c")]);
        assert_eq!(loc, "http://cb?state=a+b%26c");
    }

    #[test]
    fn found_sets_location() {
        let res = found("http://cb?code=1");
        assert_eq!(res.status(), StatusCode::FOUND);
        assert_eq!(res.headers().get(LOCATION).unwrap(), "http://cb?code=1");
    }
}
