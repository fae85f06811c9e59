//! API request and response data models.
//!
//! These define the public JSON contract and are kept apart from the database records in
//! [`crate::db::models`]. Money goes over the wire twice: as integer cents (`*_cents`) and as a
//! dollar string for display.
//!
//! - [`products`], [`allergens`]: menu items and their allergen tags
//! - [`employees`]: staff accounts
//! - [`transactions`]: orders and their line items
//! - [`reports`]: X/Z reports, sales and product usage
//! - [`chat`]: chatbot requests and replies
//! - [`auth`]: the signed-in employee and sign-in responses
//! - [`pagination`]: `skip`/`limit` query parameters and paged responses

pub mod allergens;
pub mod auth;
pub mod chat;
pub mod employees;
pub mod pagination;
pub mod products;
pub mod reports;
pub mod transactions;
