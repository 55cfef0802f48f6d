// handlers/public/mod.rs - Public handlers (no bearer token required)
//
// Security Level: anonymous role (`unauthorized` in the policy file)
// Route Prefix: /v1/auth/*
// Middleware: policy only; no session lookup

pub mod auth;

pub use auth::*;

/*
PUBLIC HANDLER NOTES:

1. **No User Context**: handlers never see an `AuthUser`, so every input is
   validated here before it reaches a repository.
2. **Security Logging**: failed logins and OTP mismatches are logged at warn
   with the email, never with the password or the submitted code.
3. **Token Acquisition**: verify-email and login both end in `open_session`,
   which is the only place a session row and its token are created together.
*/
