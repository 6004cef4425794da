pub mod authorization_code;
pub mod oauth_client;
pub mod user;
