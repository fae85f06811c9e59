//! Staff authentication and authorization.
//!
//! Employees sign in with Google. The callback looks the Google account's email up in the
//! `employees` table; a match gets a signed JWT in an HTTP-only session cookie, anything else is
//! turned away with a 401. There are no passwords and no self-registration: an admin adds the
//! employee row first.
//!
//! # Modules
//!
//! - [`google`]: OAuth2 authorization code flow against Google, with PKCE and a CSRF state
//! - [`session`]: JWT session tokens and the cookies carrying them
//! - [`current_user`]: Extractors for the signed-in employee and for admin-only routes
//!
//! # Usage in Handlers
//!
//! ```ignore
//! use bobapos::auth::current_user::RequiresAdmin;
//!
//! async fn z_report(RequiresAdmin(admin): RequiresAdmin) -> Result<Json<ZReportResponse>> {
//!     // only reached when the session belongs to an admin
//! }
//! ```

pub mod current_user;
pub mod google;
pub mod session;
