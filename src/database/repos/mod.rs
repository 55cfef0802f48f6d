pub mod business;
pub mod session;
pub mod user;

pub use business::PgBusinessRepo;
pub use session::PgSessionRepo;
pub use user::PgUserRepo;
