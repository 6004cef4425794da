use serde::Deserialize;

use crate::security::generate_token;

#[derive(Debug, Clone)]
pub struct ServerCfg {
    pub bind_addr: String,
    /// Browser origin allowed to call the OAuth endpoints with credentials.
    pub cors_allowed_origin: String,
}

#[derive(Debug, Clone)]
pub struct DbCfg {
    /// Path of the SQLite database file
    pub url: String,
}

/// Client upserted at startup from `OAUTH_CLIENT_*`.
#[derive(Clone)]
pub struct DefaultClientCfg {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub owner_email: Option<String>,
    pub owner_name: Option<String>,
}

#[derive(Clone)]
pub struct OAuthCfg {
    pub jwt_secret: String,
    pub default_client: Option<DefaultClientCfg>,
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerCfg,
    pub db: DbCfg,
    pub oauth: OAuthCfg,
}

impl std::fmt::Debug for DefaultClientCfg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultClientCfg")
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .field("redirect_uri", &self.redirect_uri)
            .field("owner_email", &self.owner_email)
            .finish()
    }
}

impl std::fmt::Debug for OAuthCfg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthCfg")
            .field("jwt_secret", &"***")
            .field("default_client", &self.default_client)
            .field("sweep_interval_secs", &self.sweep_interval_secs)
            .finish()
    }
}

/// Flat view of the process environment, keys lowercased by `config`.
#[derive(Debug, Default, Deserialize)]
struct EnvSettings {
    app_bind_addr: Option<String>,
    database_url: Option<String>,
    jwt_secret: Option<String>,
    oauth_client_id: Option<String>,
    oauth_client_secret: Option<String>,
    oauth_redirect_uri: Option<String>,
    oauth_owner_email: Option<String>,
    oauth_owner_name: Option<String>,
    cors_allowed_origin: Option<String>,
    code_sweep_interval_secs: Option<u64>,
}

pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:3001/oauth";

fn default_bind_addr() -> String { "127.0.0.1:3000".to_string() }
fn default_database_url() -> String { "dev.db".to_string() }
fn default_cors_origin() -> String { "http://localhost:3001".to_string() }

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();

        let settings = config::Config::builder()
            .add_source(config::Environment::default())
            .build()?;
        let env: EnvSettings = settings.try_deserialize()?;
        Ok(Self::from_settings(env))
    }

    fn from_settings(env: EnvSettings) -> Self {
        let server = ServerCfg {
            bind_addr: non_empty(env.app_bind_addr).unwrap_or_else(default_bind_addr),
            cors_allowed_origin: non_empty(env.cors_allowed_origin).unwrap_or_else(default_cors_origin),
        };
        let db = DbCfg {
            url: non_empty(env.database_url).unwrap_or_else(default_database_url),
        };

        let jwt_secret = match non_empty(env.jwt_secret) {
            Some(secret) => secret,
            None => {
                tracing::warn!(
                    "JWT_SECRET not provided; generated a temporary signing key. Issued tokens will be invalidated on restart."
                );
                generate_token(48)
            }
        };

        let default_client = match (non_empty(env.oauth_client_id), non_empty(env.oauth_client_secret)) {
            (Some(client_id), Some(client_secret)) => Some(DefaultClientCfg {
                client_id,
                client_secret,
                redirect_uri: non_empty(env.oauth_redirect_uri).unwrap_or_else(|| DEFAULT_REDIRECT_URI.to_string()),
                owner_email: non_empty(env.oauth_owner_email),
                owner_name: non_empty(env.oauth_owner_name),
            }),
            _ => None,
        };

        let sweep_interval_secs = env
            .code_sweep_interval_secs
            .filter(|secs| *secs > 0)
            .unwrap_or(crate::sweep::DEFAULT_SWEEP_INTERVAL.as_secs());

        AppConfig {
            server,
            db,
            oauth: OAuthCfg { jwt_secret, default_client, sweep_interval_secs },
        }
    }

    /// Config for tests and embedding: fixed secret, no default client.
    pub fn for_database(database_url: impl Into<String>, jwt_secret: impl Into<String>) -> Self {
        AppConfig {
            server: ServerCfg {
                bind_addr: "127.0.0.1:0".to_string(),
                cors_allowed_origin: default_cors_origin(),
            },
            db: DbCfg { url: database_url.into() },
            oauth: OAuthCfg {
                jwt_secret: jwt_secret.into(),
                default_client: None,
                sweep_interval_secs: crate::sweep::DEFAULT_SWEEP_INTERVAL.as_secs(),
            },
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_empty_environment() {
        let cfg = AppConfig::from_settings(EnvSettings::default());
        assert_eq!(cfg.server.bind_addr, "127.0.0.1:3000");
        assert_eq!(cfg.server.cors_allowed_origin, "http://localhost:3001");
        assert_eq!(cfg.db.url, "dev.db");
        assert!(cfg.oauth.default_client.is_none());
        assert_eq!(cfg.oauth.sweep_interval_secs, 60);
        // generated dev key
        assert!(cfg.oauth.jwt_secret.len() >= 32);
    }

    #[test]
    fn default_client_requires_id_and_secret() {
        let cfg = AppConfig::from_settings(EnvSettings {
            oauth_client_id: Some("abc".into()),
            ..Default::default()
        });
        assert!(cfg.oauth.default_client.is_none());

        let cfg = AppConfig::from_settings(EnvSettings {
            oauth_client_id: Some("abc".into()),
            oauth_client_secret: Some("shh".into()),
            oauth_owner_email: Some("me@example.com".into()),
            ..Default::default()
        });
        let client = cfg.oauth.default_client.expect("default client");
        assert_eq!(client.client_id, "abc");
        assert_eq!(client.redirect_uri, DEFAULT_REDIRECT_URI);
        assert_eq!(client.owner_email.as_deref(), Some("me@example.com"));
    }

    #[test]
    fn debug_output_masks_secrets() {
        let cfg = AppConfig::from_settings(EnvSettings {
            jwt_secret: Some("top-secret-signing-key".into()),
            oauth_client_id: Some("abc".into()),
            oauth_client_secret: Some("client-secret-value".into()),
            ..Default::default()
        });
        let out = format!("{cfg:?}");
        assert!(!out.contains("top-secret-signing-key"));
        assert!(!out.contains("client-secret-value"));
        assert!(out.contains("abc"));
    }

    #[test]
    fn zero_sweep_interval_falls_back() {
        let cfg = AppConfig::from_settings(EnvSettings {
            code_sweep_interval_secs: Some(0),
            ..Default::default()
        });
        assert_eq!(cfg.oauth.sweep_interval_secs, 60);
    }
}
