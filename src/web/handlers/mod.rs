pub mod account;
pub mod clients;
pub mod oauth;
