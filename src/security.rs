use base64::Engine as _;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use time::{Duration, OffsetDateTime};

pub const ACCESS_TOKEN_TTL_SECS: i64 = 60 * 60;
pub const REFRESH_TOKEN_TTL_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    fn ttl(self) -> Duration {
        match self {
            TokenKind::Access => Duration::seconds(ACCESS_TOKEN_TTL_SECS),
            TokenKind::Refresh => Duration::days(REFRESH_TOKEN_TTL_DAYS),
        }
    }
}

/// Claims carried by both access and refresh tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub client_id: String,
    pub scope: Option<String>,
    pub user_id: String,
    pub email: String,
    pub typ: TokenKind,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

/// Who a token pair is minted for.
#[derive(Debug, Clone)]
pub struct TokenSubject {
    pub client_id: String,
    pub scope: Option<String>,
    pub user_id: String,
    pub email: String,
}

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,
    #[error("unexpected token type")]
    WrongKind,
    #[error("invalid token: {0}")]
    Invalid(String),
}

/// HS256 signer/verifier. Expiry is checked against the caller's clock, not
/// the JWT library's.
pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenSigner {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp"]);
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn issue(&self, subject: &TokenSubject, kind: TokenKind, now: OffsetDateTime) -> anyhow::Result<String> {
        let claims = Claims {
            client_id: subject.client_id.clone(),
            scope: subject.scope.clone(),
            user_id: subject.user_id.clone(),
            email: subject.email.clone(),
            typ: kind,
            iat: now.unix_timestamp(),
            exp: (now + kind.ttl()).unix_timestamp(),
            jti: uuid::Uuid::new_v4().to_string(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        Ok(token)
    }

    pub fn issue_pair(&self, subject: &TokenSubject, now: OffsetDateTime) -> anyhow::Result<TokenPair> {
        Ok(TokenPair {
            access_token: self.issue(subject, TokenKind::Access, now)?,
            refresh_token: self.issue(subject, TokenKind::Refresh, now)?,
            expires_in: ACCESS_TOKEN_TTL_SECS,
        })
    }

    pub fn verify(&self, token: &str, expected: TokenKind, now: OffsetDateTime) -> Result<Claims, TokenError> {
        let claims = decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| TokenError::Invalid(e.to_string()))?;
        if claims.typ != expected {
            return Err(TokenError::WrongKind);
        }
        if now.unix_timestamp() >= claims.exp {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }
}

/// Random URL-safe token of `bytes` bytes of entropy.
pub fn generate_token(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::rngs::OsRng.fill_bytes(&mut buf);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf)
}

pub fn hash_token(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn verify_client_secret(provided: &str, stored_hash: &str) -> bool {
    !provided.is_empty() && hash_token(provided) == stored_hash
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subject() -> TokenSubject {
        TokenSubject {
            client_id: "client-1".into(),
            scope: Some("goals".into()),
            user_id: "user-1".into(),
            email: "me@example.com".into(),
        }
    }

    fn at(secs: i64) -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(secs).unwrap()
    }

    #[test]
    fn pair_carries_subject_claims() {
        let signer = TokenSigner::new("test-secret");
        let now = at(1_700_000_000);
        let pair = signer.issue_pair(&subject(), now).unwrap();
        assert_eq!(pair.expires_in, 3600);

        let access = signer.verify(&pair.access_token, TokenKind::Access, now).unwrap();
        assert_eq!(access.client_id, "client-1");
        assert_eq!(access.scope.as_deref(), Some("goals"));
        assert_eq!(access.user_id, "user-1");
        assert_eq!(access.email, "me@example.com");
        assert_eq!(access.exp - access.iat, 3600);

        let refresh = signer.verify(&pair.refresh_token, TokenKind::Refresh, now).unwrap();
        assert_eq!(refresh.exp - refresh.iat, 7 * 24 * 3600);
    }

    #[test]
    fn kinds_are_not_interchangeable() {
        let signer = TokenSigner::new("test-secret");
        let now = at(1_700_000_000);
        let pair = signer.issue_pair(&subject(), now).unwrap();
        assert!(matches!(signer.verify(&pair.access_token, TokenKind::Refresh, now), Err(TokenError::WrongKind)));
        assert!(matches!(signer.verify(&pair.refresh_token, TokenKind::Access, now), Err(TokenError::WrongKind)));
    }

    #[test]
    fn expiry_follows_supplied_clock() {
        let signer = TokenSigner::new("test-secret");
        let now = at(1_700_000_000);
        let token = signer.issue(&subject(), TokenKind::Access, now).unwrap();
        assert!(signer.verify(&token, TokenKind::Access, now + Duration::minutes(59)).is_ok());
        assert!(matches!(
            signer.verify(&token, TokenKind::Access, now + Duration::hours(1)),
            Err(TokenError::Expired)
        ));
    }

    #[test]
    fn wall_clock_does_not_expire_tokens() {
        // exp is long past in real time; only the supplied clock counts
        let signer = TokenSigner::new("test-secret");
        let issued = at(1_000_000_000);
        let token = signer.issue(&subject(), TokenKind::Refresh, issued).unwrap();
        assert!(signer.verify(&token, TokenKind::Refresh, issued + Duration::days(6)).is_ok());
        assert!(matches!(
            signer.verify(&token, TokenKind::Refresh, issued + Duration::days(7)),
            Err(TokenError::Expired)
        ));
    }

    #[test]
    fn foreign_signature_is_rejected() {
        let now = at(1_700_000_000);
        let token = TokenSigner::new("other").issue(&subject(), TokenKind::Refresh, now).unwrap();
        let res = TokenSigner::new("test-secret").verify(&token, TokenKind::Refresh, now);
        assert!(matches!(res, Err(TokenError::Invalid(_))));
    }

    #[test]
    fn client_secret_check() {
        let stored = hash_token("s3cret");
        assert!(verify_client_secret("s3cret", &stored));
        assert!(!verify_client_secret("wrong", &stored));
        assert!(!verify_client_secret("", &hash_token("")));
    }

    #[test]
    fn generated_tokens_are_url_safe() {
        let t = generate_token(32);
        assert_eq!(t.len(), 43);
        assert!(t.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }
}
