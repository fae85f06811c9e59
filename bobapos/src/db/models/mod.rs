//! Database record models.
//!
//! These structs are what repositories accept and return. They are kept apart from the API models
//! in [`crate::api::models`] so storage and wire formats can change independently; API request
//! types convert into the `*DBRequest` types with `From`, and `*DBResponse` types convert into API
//! responses the same way.
//!
//! The Postgres enums (`product_type`, `payment_type`, `transaction_type`) are mapped here with
//! `sqlx::Type` and reused directly by the API layer.

pub mod allergens;
pub mod employees;
pub mod products;
pub mod transactions;
