pub mod app;
pub mod auth;
pub mod client;
pub mod config;
pub mod db;
pub mod mail;
pub mod rate_limit;
