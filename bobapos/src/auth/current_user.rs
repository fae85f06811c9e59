//! Extractors for the signed-in employee.
//!
//! [`CurrentEmployee`] is resolved from the JWT session cookie alone. The admin flag comes from
//! the token claims, so a demotion takes effect when the employee's session expires.

use crate::{
    AppState,
    api::models::auth::CurrentEmployee,
    auth::session,
    config::Config,
    errors::{Error, Result},
    types::Operation,
};
use axum::{
    extract::FromRequestParts,
    http::{Method, request::Parts},
};
use tracing::{debug, instrument, trace};

/// Extract the employee from the session cookie if present and valid
/// Returns:
/// - None: no session cookie, or only invalid/expired ones
/// - Some(Ok(employee)): a valid session
/// - Some(Err(error)): the cookie header itself is unreadable
#[instrument(skip(parts, config))]
fn try_session_auth(parts: &Parts, config: &Config) -> Option<Result<CurrentEmployee>> {
    let cookie_header = parts.headers.get(axum::http::header::COOKIE)?;

    let cookie_str = match cookie_header.to_str() {
        Ok(s) => s,
        Err(e) => {
            return Some(Err(Error::BadRequest {
                message: format!("Invalid cookie header: {e}"),
            }));
        }
    };
    let cookie_name = &config.auth.session.cookie_name;

    for cookie in cookie_str.split(';') {
        if let Some((name, value)) = cookie.trim().split_once('=')
            && name == cookie_name
        {
            match session::verify_session_token(value, config) {
                Ok(employee) => return Some(Ok(employee)),
                Err(e) => {
                    // Expired tokens are routine; keep looking in case a newer cookie follows
                    trace!("Session token rejected: {e}");
                    continue;
                }
            }
        }
    }
    None
}

impl FromRequestParts<AppState> for CurrentEmployee {
    type Rejection = Error;

    #[instrument(skip(parts, state))]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        match try_session_auth(parts, &state.config) {
            Some(Ok(employee)) => {
                debug!("Found session for employee {}", employee.id);
                Ok(employee)
            }
            Some(Err(e)) => Err(e),
            None => {
                trace!("No valid session cookie in request");
                Err(Error::Unauthenticated { message: None })
            }
        }
    }
}

/// A signed-in employee with the admin flag set
#[derive(Debug, Clone)]
pub struct RequiresAdmin(pub CurrentEmployee);

impl FromRequestParts<AppState> for RequiresAdmin {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let employee = CurrentEmployee::from_request_parts(parts, state).await?;
        require_admin(employee, &parts.method, parts.uri.path())
    }
}

/// Admit admins; everyone else gets a 403 naming what they tried to do
pub fn require_admin(employee: CurrentEmployee, method: &Method, path: &str) -> Result<RequiresAdmin> {
    if employee.is_admin {
        return Ok(RequiresAdmin(employee));
    }

    debug!("Employee {} is not an admin, denying {method} {path}", employee.id);
    Err(Error::InsufficientPermissions {
        action: operation_for(method),
        resource: resource_for(path),
    })
}

fn operation_for(method: &Method) -> Operation {
    match *method {
        Method::POST => Operation::Create,
        Method::PATCH | Method::PUT => Operation::Update,
        Method::DELETE => Operation::Delete,
        _ => Operation::Read,
    }
}

/// First path segment below the API prefix, e.g. `/api/v1/reports/z` is `reports`
fn resource_for(path: &str) -> String {
    path.split('/')
        .filter(|s| !s.is_empty())
        .find(|s| *s != "api" && *s != "v1")
        .unwrap_or("resource")
        .to_string()
}
