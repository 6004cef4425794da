use diesel::prelude::*;

/// A pending authorization code. Rows are keyed by the SHA-256 digest of the
/// code handed to the client; `expires_at` is unix seconds.
#[derive(Debug, Clone, Queryable, Identifiable, Insertable)]
#[diesel(primary_key(code_hash))]
#[diesel(table_name = crate::schema::authorization_codes)]
pub struct AuthorizationCode {
    pub code_hash: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub scope: Option<String>,
    pub state: Option<String>,
    pub expires_at: i64,
    pub created_at: i64,
}

impl AuthorizationCode {
    pub fn is_expired_at(&self, now: i64) -> bool {
        now > self.expires_at
    }
}

/// Outcome of an atomic lookup-and-delete of an authorization code.
#[derive(Debug, Clone)]
pub enum CodeRedemption {
    /// The code matched and has been deleted.
    Redeemed(AuthorizationCode),
    NotFound,
    /// Issued to another client; the row is left in place.
    ClientMismatch,
    /// Issued for another redirect URI; the row is left in place.
    RedirectMismatch,
    /// Past `expires_at`; the row has been deleted.
    Expired,
}
