use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::{
    app::AppState,
    error::OAuthError,
    models::oauth_client::{
        default_grants, encode_list, is_valid_redirect_uri, OAuthClient, GRANT_AUTHORIZATION_CODE, GRANT_REFRESH_TOKEN,
    },
    security::{generate_token, hash_token},
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateClientRequest {
    #[serde(default)]
    pub redirect_uris: Vec<String>,
    #[serde(default)]
    pub grants: Vec<String>,
}

/// The only time the plaintext secret leaves the server.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateClientResponse {
    pub client_id: String,
    pub client_secret: String,
}

/// `POST /oauth/clients`
pub async fn create_client(
    State(state): State<AppState>,
    payload: Result<Json<CreateClientRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateClientResponse>), OAuthError> {
    let Json(req) = payload.map_err(|e| OAuthError::bad_request(e.body_text()))?;

    if req.redirect_uris.is_empty() {
        return Err(OAuthError::bad_request("Invalid redirect URI"));
    }
    if let Some(bad) = req.redirect_uris.iter().find(|u| !is_valid_redirect_uri(u)) {
        tracing::info!(redirect_uri = %bad, "rejected client registration");
        return Err(OAuthError::bad_request("Invalid redirect URI"));
    }

    let grants = if req.grants.is_empty() { default_grants() } else { req.grants };
    if grants
        .iter()
        .any(|g| g != GRANT_AUTHORIZATION_CODE && g != GRANT_REFRESH_TOKEN)
    {
        return Err(OAuthError::bad_request("Unsupported grant type"));
    }

    let client_id = uuid::Uuid::new_v4().to_string();
    let client_secret = generate_token(32);
    let now = state.clock.unix_now();

    let client = OAuthClient {
        id: uuid::Uuid::new_v4().to_string(),
        client_id: client_id.clone(),
        client_secret_hash: hash_token(&client_secret),
        redirect_uris: encode_list(&req.redirect_uris),
        grants: encode_list(&grants),
        user_id: None,
        created_at: now,
        updated_at: now,
    };

    state
        .repo
        .create_client(client)
        .await
        .map_err(|e| OAuthError::internal("Failed to create OAuth client", e))?;

    tracing::info!(%client_id, redirect_uris = ?req.redirect_uris, "registered oauth client");
    Ok((StatusCode::CREATED, Json(CreateClientResponse { client_id, client_secret })))
}
