pub mod auth;
pub mod response;

pub use auth::{authorize, AuthUser};
pub use response::{ApiResponse, ApiResult, Message};
