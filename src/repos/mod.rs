use async_trait::async_trait;

use crate::models::{
    authorization_code::{AuthorizationCode, CodeRedemption},
    oauth_client::OAuthClient,
    user::{NewUser, User},
};

#[async_trait]
pub trait OAuthRepo: Send + Sync {
    // Client operations
    async fn create_client(&self, client: OAuthClient) -> anyhow::Result<()>;
    /// Insert, or refresh secret/redirect URIs/grants of an existing `client_id`.
    async fn upsert_client(&self, client: OAuthClient) -> anyhow::Result<()>;
    async fn get_client(&self, client_id: &str) -> anyhow::Result<Option<OAuthClient>>;
    async fn link_client_user(&self, client_id: &str, user_id: &str, now: i64) -> anyhow::Result<()>;

    // User operations
    async fn create_user(&self, new_user: NewUser<'_>) -> anyhow::Result<User>;
    async fn get_user(&self, id: &str) -> anyhow::Result<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;

    // Authorization code operations
    async fn create_authorization_code(&self, code: AuthorizationCode) -> anyhow::Result<()>;
    /// Look up and delete a code in one transaction. At most one concurrent
    /// caller observes `Redeemed` for a given code.
    async fn redeem_authorization_code(
        &self,
        code_hash: &str,
        client_id: &str,
        redirect_uri: &str,
        now: i64,
    ) -> anyhow::Result<CodeRedemption>;
    /// Delete every code whose `expires_at` is before `now`.
    async fn delete_expired_codes(&self, now: i64) -> anyhow::Result<usize>;
    async fn count_authorization_codes(&self) -> anyhow::Result<i64>;
}

pub mod sqlite;
