use diesel::prelude::*;
use serde::{Deserialize, Serialize};

pub const GRANT_AUTHORIZATION_CODE: &str = "authorization_code";
pub const GRANT_REFRESH_TOKEN: &str = "refresh_token";

/// A registered OAuth client. `redirect_uris` and `grants` hold JSON arrays
/// of strings.
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Identifiable, Insertable)]
#[diesel(table_name = crate::schema::oauth_clients)]
pub struct OAuthClient {
    pub id: String,
    pub client_id: String,
    pub client_secret_hash: String,
    pub redirect_uris: String,
    pub grants: String,
    pub user_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl OAuthClient {
    pub fn redirect_uri_list(&self) -> Vec<String> {
        decode_list(&self.redirect_uris)
    }

    pub fn grant_list(&self) -> Vec<String> {
        decode_list(&self.grants)
    }

    /// Exact string membership against the registered redirect URIs.
    pub fn allows_redirect_uri(&self, redirect_uri: &str) -> bool {
        self.redirect_uri_list().iter().any(|r| r == redirect_uri)
    }
}

pub fn default_grants() -> Vec<String> {
    vec![
        GRANT_AUTHORIZATION_CODE.to_string(),
        GRANT_REFRESH_TOKEN.to_string(),
    ]
}

pub fn encode_list(items: &[String]) -> String {
    serde_json::to_string(items).unwrap_or_else(|_| "[]".to_string())
}

/// Redirect URIs must be absolute and fragment-free.
pub fn is_valid_redirect_uri(value: &str) -> bool {
    match url::Url::parse(value) {
        Ok(url) => url.fragment().is_none(),
        Err(_) => false,
    }
}

// Unreadable lists are treated as empty (fail closed)
fn decode_list(raw: &str) -> Vec<String> {
    serde_json::from_str(raw).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(redirect_uris: &str) -> OAuthClient {
        OAuthClient {
            id: "row".into(),
            client_id: "client".into(),
            client_secret_hash: "hash".into(),
            redirect_uris: redirect_uris.into(),
            grants: encode_list(&default_grants()),
            user_id: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn redirect_uri_membership_is_exact() {
        let c = client(r#"["http://cb","http://localhost:3001/oauth"]"#);
        assert!(c.allows_redirect_uri("http://cb"));
        assert!(c.allows_redirect_uri("http://localhost:3001/oauth"));
        assert!(!c.allows_redirect_uri("http://cb/"));
        assert!(!c.allows_redirect_uri("http://localhost:3001/oauth?x=1"));
    }

    #[test]
    fn malformed_redirect_list_allows_nothing() {
        let c = client("not json");
        assert!(c.redirect_uri_list().is_empty());
        assert!(!c.allows_redirect_uri("not json"));
    }

    #[test]
    fn redirect_uri_validation() {
        assert!(is_valid_redirect_uri("http://cb"));
        assert!(is_valid_redirect_uri("http://localhost:3001/oauth"));
        assert!(is_valid_redirect_uri("com.example.app:/callback"));
        assert!(!is_valid_redirect_uri("/relative/path"));
        assert!(!is_valid_redirect_uri("http://cb/#frag"));
        assert!(!is_valid_redirect_uri(""));
    }

    #[test]
    fn grants_round_trip_through_json_column() {
        let c = client("[]");
        assert_eq!(c.grant_list(), vec!["authorization_code", "refresh_token"]);
    }
}
