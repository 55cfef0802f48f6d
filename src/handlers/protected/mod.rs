// handlers/protected/mod.rs - Protected handlers (bearer token required)
//
// Security Level: token + live session, then policy on the token's user_role
// Route Prefix: /v1/auth/logout, /v1/user/*, /v1/session/*, /v1/business/*
// Middleware: `middleware::authorize` inserts `AuthUser` before these run

pub mod auth;     // Session teardown
pub mod business; // Business CRUD and field updates
pub mod session;  // Session administration
pub mod user;     // Account administration

pub use auth::*;

/*
PROTECTED HANDLER NOTES:

Each entity module exposes the same six operations, named after the route:
create / get / list / update / delete / update_fields (session has no
create; sessions are only opened by login and verify-email).

List endpoints translate query parameters into `GetListFilter` filters:
- `search` becomes one search filter per text column, which the query
  builder ORs together because they share a term
- every other named parameter becomes an exact filter, ANDed with the rest
- `page`/`limit` default to 1/10 and `limit` is capped by FILTER_MAX_LIMIT
*/
