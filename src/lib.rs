pub mod auth;
pub mod cache;
pub mod config;
pub mod database;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod mail;
pub mod metrics;
pub mod middleware;
pub mod openapi;
pub mod policy;
pub mod router;
pub mod state;
pub mod usecase;

#[cfg(test)]
pub mod testing;
