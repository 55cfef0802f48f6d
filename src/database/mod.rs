pub mod manager;
pub mod models;
pub mod query_builder;
pub mod repos;
pub mod repository;

pub use manager::{DatabaseError, DatabaseManager};
