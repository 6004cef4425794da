pub mod app;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod repos;
pub mod schema;
pub mod security;
pub mod seed;
pub mod sweep;
pub mod web;
