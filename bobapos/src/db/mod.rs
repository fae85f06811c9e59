//! Database layer: Postgres access through sqlx.
//!
//! ```text
//! api handlers ──> db::handlers (repositories, report queries) ──> PostgreSQL
//!                        │
//!                        └── db::models (records passed in and out)
//! ```
//!
//! - [`handlers`]: repositories and report queries
//! - [`models`]: request/response records and the Postgres enums
//! - [`errors`]: [`errors::DbError`], built from `sqlx::Error` by constraint kind
//!
//! Schema migrations live in `migrations/` and are applied at startup through
//! [`crate::migrator`].

pub mod errors;
pub mod handlers;
pub mod models;
