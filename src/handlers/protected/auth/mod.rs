// handlers/protected/auth/mod.rs - Authenticated session endpoints

pub mod logout;

pub use logout::logout_post;
