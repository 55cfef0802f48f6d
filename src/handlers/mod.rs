// handlers/mod.rs - Two-tier handler layout
//
// Public (anonymous role) → Protected (bearer token + live session)
//
// Both tiers sit behind the same policy middleware. The split only says
// whether a handler can expect an `AuthUser` in its request extensions.
pub mod public;    // /v1/auth/{register,verify-email,login}
pub mod protected; // /v1/auth/logout, /v1/{user,session,business}/*
pub mod utils;
