use axum::Json;
use serde_json::json;

use crate::web::{bearer::BearerUser, handlers::oauth::UserSummary};

/// `GET /oauth/me`: the user and grant behind an access token.
pub async fn me(BearerUser { claims, user }: BearerUser) -> Json<serde_json::Value> {
    Json(json!({
        "clientId": claims.client_id,
        "scope": claims.scope,
        "user": UserSummary::from(&user),
    }))
}
