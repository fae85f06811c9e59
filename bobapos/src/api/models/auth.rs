//! API models for the Google sign-in flow and the session endpoints.

use crate::{db::models::employees::EmployeeDBResponse, types::EmployeeId};
use axum::{
    Json,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::error;
use utoipa::{IntoParams, ToSchema};

/// The signed-in employee, as carried in the session token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CurrentEmployee {
    pub id: EmployeeId,
    pub name: String,
    pub email: String,
    pub is_admin: bool,
}

impl From<EmployeeDBResponse> for CurrentEmployee {
    fn from(db: EmployeeDBResponse) -> Self {
        Self {
            id: db.id,
            name: db.name,
            email: db.email,
            is_admin: db.is_admin,
        }
    }
}

/// Query string Google appends when redirecting back to us
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct OAuthCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    /// Set instead of `code` when the user denied consent
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthSuccessResponse {
    pub message: String,
}

/// 303 redirect that optionally sets a cookie on the way
#[derive(Debug)]
pub struct SessionRedirect {
    pub location: String,
    pub cookie: Option<String>,
}

impl IntoResponse for SessionRedirect {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        match HeaderValue::from_str(&self.location) {
            Ok(location) => {
                headers.insert(header::LOCATION, location);
            }
            Err(e) => {
                error!("Invalid redirect location {}: {e}", self.location);
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        }
        if let Some(cookie) = self.cookie.and_then(|c| HeaderValue::from_str(&c).ok()) {
            headers.insert(header::SET_COOKIE, cookie);
        }
        (StatusCode::SEE_OTHER, headers).into_response()
    }
}

#[derive(Debug)]
pub struct LogoutResponse {
    pub auth_response: AuthSuccessResponse,
    pub cookie: String,
}

impl IntoResponse for LogoutResponse {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        if let Ok(cookie) = HeaderValue::from_str(&self.cookie) {
            headers.insert(header::SET_COOKIE, cookie);
        }
        (StatusCode::OK, headers, Json(self.auth_response)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redirect_sets_location_and_cookie() {
        let response = SessionRedirect {
            location: "/register".to_string(),
            cookie: Some("bobapos_session=abc; Path=/".to_string()),
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/register");
        assert_eq!(response.headers().get(header::SET_COOKIE).unwrap(), "bobapos_session=abc; Path=/");
    }

    #[test]
    fn test_redirect_without_cookie() {
        let response = SessionRedirect {
            location: "https://accounts.google.com/o/oauth2/v2/auth?state=x".to_string(),
            cookie: None,
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert!(response.headers().get(header::SET_COOKIE).is_none());
    }
}
