//! REST API: route handlers and their request/response models.
//!
//! - **Authentication** (`/authentication/*`): Google sign-in, logout, current employee
//! - **Menu** (`/api/v1/products/*`, `/api/v1/allergens/*`): public reads, admin writes
//! - **Register** (`/api/v1/transactions/*`): any signed-in employee
//! - **Staff** (`/api/v1/employees/*`) and **Reports** (`/api/v1/reports/*`): admins only
//! - **Chat** (`/api/v1/chat`): public recommendations
//!
//! Documentation is generated with `utoipa` and served at `/api/docs`.

pub mod handlers;
pub mod models;
