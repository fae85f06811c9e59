//! Repositories over the POS tables.
//!
//! Each repository wraps a `&mut PgConnection` and owns the SQL for one table (plus its join
//! tables). Pass a transaction when several repository calls must commit together:
//!
//! ```ignore
//! use bobapos::db::handlers::{Employees, Repository};
//!
//! let mut conn = pool.acquire().await?;
//! let employee = Employees::new(&mut conn).get_by_email("cashier@boba.example").await?;
//! ```
//!
//! - [`Products`], [`Allergens`], [`Employees`]: CRUD through the [`Repository`] trait
//! - [`Transactions`]: recording orders, which also moves inventory
//! - [`reports`]: read-only aggregation queries over the pool

pub mod allergens;
pub mod employees;
pub mod products;
pub mod reports;
pub mod repository;
pub mod transactions;

pub use allergens::Allergens;
pub use employees::Employees;
pub use products::Products;
pub use repository::Repository;
pub use transactions::Transactions;
