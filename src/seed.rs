//! Startup seeding of the default OAuth client.

use anyhow::Context;

use crate::{
    clock::Clock,
    config::OAuthCfg,
    models::{
        oauth_client::{default_grants, encode_list, is_valid_redirect_uri, OAuthClient},
        user::NewUser,
    },
    repos::OAuthRepo,
    security::hash_token,
};

/// Upsert the client named by `OAUTH_CLIENT_ID`/`OAUTH_CLIENT_SECRET` and,
/// when an owner email is configured, link it to that user (creating the
/// user if needed). An existing owner link is kept when no owner is set.
pub async fn seed_default_client(repo: &dyn OAuthRepo, cfg: &OAuthCfg, clock: &dyn Clock) -> anyhow::Result<()> {
    let Some(default) = cfg.default_client.as_ref() else {
        tracing::warn!("OAuth client credentials not found in environment; no default client seeded");
        return Ok(());
    };

    if !is_valid_redirect_uri(&default.redirect_uri) {
        tracing::warn!(
            client_id = %default.client_id,
            redirect_uri = %default.redirect_uri,
            "OAUTH_REDIRECT_URI must be absolute without a fragment; default client not seeded"
        );
        return Ok(());
    }

    tracing::info!(client_id = %default.client_id, "initializing default OAuth client");
    let now = clock.unix_now();
    repo.upsert_client(OAuthClient {
        id: uuid::Uuid::new_v4().to_string(),
        client_id: default.client_id.clone(),
        client_secret_hash: hash_token(&default.client_secret),
        redirect_uris: encode_list(&[default.redirect_uri.clone()]),
        grants: encode_list(&default_grants()),
        user_id: None,
        created_at: now,
        updated_at: now,
    })
    .await
    .context("upsert default oauth client")?;

    let Some(email) = default.owner_email.as_deref() else {
        return Ok(());
    };

    let owner = match repo.find_user_by_email(email).await? {
        Some(user) => user,
        None => {
            let id = uuid::Uuid::new_v4().to_string();
            repo.create_user(NewUser {
                id: &id,
                name: default.owner_name.as_deref(),
                email,
                avatar_url: None,
                created_at: now,
            })
            .await
            .context("create default client owner")?
        }
    };

    repo.link_client_user(&default.client_id, &owner.id, now)
        .await
        .context("link default client owner")?;
    tracing::info!(client_id = %default.client_id, user_id = %owner.id, "linked default OAuth client to owner");
    Ok(())
}
