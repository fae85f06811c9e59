//! HTTP request handlers, one module per resource.
//!
//! Handlers validate input, check the caller with the [`crate::auth::current_user`] extractors,
//! call into the [`crate::db`] repositories and map the results to API models.
//!
//! - [`products`], [`allergens`]: the menu (reads are public)
//! - [`transactions`]: recording and browsing orders (any signed-in employee)
//! - [`employees`], [`reports`]: manager-only administration
//! - [`chat`]: the public recommendation chatbot
//! - [`auth`]: Google sign-in, logout and the current session
//!
//! Handlers return [`crate::errors::Result`], which turns into the right status code and body.

pub mod allergens;
pub mod auth;
pub mod chat;
pub mod employees;
pub mod products;
pub mod reports;
pub mod transactions;
