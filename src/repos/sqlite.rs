use std::sync::Arc;

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::OptionalExtension;

use crate::models::{
    authorization_code::{AuthorizationCode, CodeRedemption},
    oauth_client::OAuthClient,
    user::{NewUser, User},
};
use crate::repos::OAuthRepo;
use crate::schema::{authorization_codes, oauth_clients, users};

pub struct SqliteOAuthRepo {
    pool: crate::db::sqlite::SqlitePool,
}

impl SqliteOAuthRepo {
    pub fn new(pool: crate::db::sqlite::SqlitePool) -> Arc<Self> {
        Arc::new(Self { pool })
    }
}

#[async_trait]
impl OAuthRepo for SqliteOAuthRepo {
    async fn create_client(&self, client: OAuthClient) -> anyhow::Result<()> {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
            let mut conn = pool.get()?;
            diesel::insert_into(oauth_clients::table)
                .values(&client)
                .execute(&mut conn)?;
            Ok(())
        })
        .await??;
        Ok(())
    }

    async fn upsert_client(&self, client: OAuthClient) -> anyhow::Result<()> {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
            let mut conn = pool.get()?;
            use oauth_clients::dsl as oc;
            diesel::insert_into(oc::oauth_clients)
                .values(&client)
                .on_conflict(oc::client_id)
                .do_update()
                .set((
                    oc::client_secret_hash.eq(&client.client_secret_hash),
                    oc::redirect_uris.eq(&client.redirect_uris),
                    oc::grants.eq(&client.grants),
                    oc::updated_at.eq(client.updated_at),
                ))
                .execute(&mut conn)?;
            Ok(())
        })
        .await??;
        Ok(())
    }

    async fn get_client(&self, client_id: &str) -> anyhow::Result<Option<OAuthClient>> {
        let client_id = client_id.to_string();
        let pool = self.pool.clone();
        let res = tokio::task::spawn_blocking(move || -> anyhow::Result<Option<OAuthClient>> {
            let mut conn = pool.get()?;
            use oauth_clients::dsl as oc;
            let row = oc::oauth_clients
                .filter(oc::client_id.eq(&client_id))
                .first::<OAuthClient>(&mut conn)
                .optional()?;
            Ok(row)
        })
        .await?;
        res
    }

    async fn link_client_user(&self, client_id: &str, user_id: &str, now: i64) -> anyhow::Result<()> {
        let client_id = client_id.to_string();
        let user_id = user_id.to_string();
        let pool = self.pool.clone();
        let updated = tokio::task::spawn_blocking(move || -> anyhow::Result<usize> {
            let mut conn = pool.get()?;
            use oauth_clients::dsl as oc;
            let n = diesel::update(oc::oauth_clients.filter(oc::client_id.eq(&client_id)))
                .set((oc::user_id.eq(Some(&user_id)), oc::updated_at.eq(now)))
                .execute(&mut conn)?;
            Ok(n)
        })
        .await??;
        if updated == 0 {
            anyhow::bail!("no oauth client to link");
        }
        Ok(())
    }

    async fn create_user(&self, new_user: NewUser<'_>) -> anyhow::Result<User> {
        let pool = self.pool.clone();
        let new_user = (
            new_user.id.to_string(),
            new_user.name.map(|s| s.to_string()),
            new_user.email.to_string(),
            new_user.avatar_url.map(|s| s.to_string()),
            new_user.created_at,
        );
        let user = tokio::task::spawn_blocking(move || -> anyhow::Result<User> {
            let mut conn = pool.get()?;
            conn.immediate_transaction(|conn| {
                diesel::insert_into(users::table)
                    .values(&NewUser {
                        id: &new_user.0,
                        name: new_user.1.as_deref(),
                        email: &new_user.2,
                        avatar_url: new_user.3.as_deref(),
                        created_at: new_user.4,
                    })
                    .execute(conn)?;
                let u = users::table.find(&new_user.0).first::<User>(conn)?;
                Ok(u)
            })
        })
        .await??;
        Ok(user)
    }

    async fn get_user(&self, id: &str) -> anyhow::Result<Option<User>> {
        let id = id.to_string();
        let pool = self.pool.clone();
        let res = tokio::task::spawn_blocking(move || -> anyhow::Result<Option<User>> {
            let mut conn = pool.get()?;
            let u = users::table.find(&id).first::<User>(&mut conn).optional()?;
            Ok(u)
        })
        .await?;
        res
    }

    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let email = email.to_string();
        let pool = self.pool.clone();
        let res = tokio::task::spawn_blocking(move || -> anyhow::Result<Option<User>> {
            let mut conn = pool.get()?;
            let u = users::table
                .filter(users::email.eq(&email))
                .first::<User>(&mut conn)
                .optional()?;
            Ok(u)
        })
        .await?;
        res
    }

    async fn create_authorization_code(&self, code: AuthorizationCode) -> anyhow::Result<()> {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
            let mut conn = pool.get()?;
            diesel::insert_into(authorization_codes::table)
                .values(&code)
                .execute(&mut conn)?;
            Ok(())
        })
        .await??;
        Ok(())
    }

    async fn redeem_authorization_code(
        &self,
        code_hash: &str,
        client_id: &str,
        redirect_uri: &str,
        now: i64,
    ) -> anyhow::Result<CodeRedemption> {
        let code_hash = code_hash.to_string();
        let client_id = client_id.to_string();
        let redirect_uri = redirect_uri.to_string();
        let pool = self.pool.clone();
        let outcome = tokio::task::spawn_blocking(move || -> anyhow::Result<CodeRedemption> {
            let mut conn = pool.get()?;
            // IMMEDIATE takes the write lock up front, so a second redeemer
            // blocks until this one has deleted the row.
            conn.immediate_transaction(|conn| {
                use authorization_codes::dsl as ac;
                let row = ac::authorization_codes
                    .filter(ac::code_hash.eq(&code_hash))
                    .first::<AuthorizationCode>(conn)
                    .optional()?;
                let Some(row) = row else {
                    return Ok(CodeRedemption::NotFound);
                };
                if row.client_id != client_id {
                    return Ok(CodeRedemption::ClientMismatch);
                }
                if row.redirect_uri != redirect_uri {
                    return Ok(CodeRedemption::RedirectMismatch);
                }
                let deleted = diesel::delete(ac::authorization_codes.filter(ac::code_hash.eq(&code_hash)))
                    .execute(conn)?;
                if deleted == 0 {
                    return Ok(CodeRedemption::NotFound);
                }
                if row.is_expired_at(now) {
                    return Ok(CodeRedemption::Expired);
                }
                Ok(CodeRedemption::Redeemed(row))
            })
        })
        .await??;
        Ok(outcome)
    }

    async fn delete_expired_codes(&self, now: i64) -> anyhow::Result<usize> {
        let pool = self.pool.clone();
        let n = tokio::task::spawn_blocking(move || -> anyhow::Result<usize> {
            let mut conn = pool.get()?;
            use authorization_codes::dsl as ac;
            let res = diesel::delete(ac::authorization_codes.filter(ac::expires_at.lt(now)))
                .execute(&mut conn)?;
            Ok(res)
        })
        .await??;
        Ok(n)
    }

    async fn count_authorization_codes(&self) -> anyhow::Result<i64> {
        let pool = self.pool.clone();
        let n = tokio::task::spawn_blocking(move || -> anyhow::Result<i64> {
            let mut conn = pool.get()?;
            use authorization_codes::dsl as ac;
            let n: i64 = ac::authorization_codes.count().get_result(&mut conn)?;
            Ok(n)
        })
        .await??;
        Ok(n)
    }
}
