//! HTTP handlers for staff sign-in and sessions.

use crate::{
    AppState,
    api::models::auth::{AuthSuccessResponse, CurrentEmployee, LogoutResponse, OAuthCallbackQuery, SessionRedirect},
    auth::session::{create_session_token, expired_session_cookie, session_cookie},
    db::handlers::Employees,
    errors::{Error, Result},
};
use axum::{
    Json,
    extract::{Query, State},
};
use tracing::{info, warn};

/// Start Google sign-in
#[utoipa::path(
    get,
    path = "/authentication/google",
    tag = "authentication",
    summary = "Start Google sign-in",
    responses(
        (status = 303, description = "Redirect to Google's consent screen"),
        (status = 503, description = "Google sign-in is not configured"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn google_login(State(state): State<AppState>) -> Result<SessionRedirect> {
    let google = state.google.as_ref().ok_or_else(|| Error::ServiceUnavailable {
        message: "Google sign-in is not enabled".to_string(),
    })?;

    let (url, _state) = google.authorize_url().await;
    Ok(SessionRedirect {
        location: url.to_string(),
        cookie: None,
    })
}

/// Finish Google sign-in
#[utoipa::path(
    get,
    path = "/authentication/google/callback",
    tag = "authentication",
    summary = "Google sign-in callback",
    description = "Signs in the employee whose email matches the Google account, sets the session cookie and \
                   redirects to the dashboard.",
    params(OAuthCallbackQuery),
    responses(
        (status = 303, description = "Signed in; session cookie set"),
        (status = 400, description = "Missing code, or unknown or expired state"),
        (status = 401, description = "Consent denied, or no employee with this email"),
        (status = 503, description = "Google sign-in is not configured"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn google_callback(State(state): State<AppState>, Query(query): Query<OAuthCallbackQuery>) -> Result<SessionRedirect> {
    let google = state.google.as_ref().ok_or_else(|| Error::ServiceUnavailable {
        message: "Google sign-in is not enabled".to_string(),
    })?;

    if let Some(error) = query.error {
        info!("Google sign-in was not completed: {error}");
        return Err(Error::Unauthenticated {
            message: Some("Google sign-in was cancelled".to_string()),
        });
    }
    let (Some(code), Some(csrf_state)) = (query.code, query.state) else {
        return Err(Error::BadRequest {
            message: "Callback is missing code or state".to_string(),
        });
    };

    let profile = google.exchange_code(code, &csrf_state).await?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let employee = match Employees::new(&mut conn).get_by_email(&profile.email).await? {
        Some(employee) => CurrentEmployee::from(employee),
        None => {
            warn!(sub = %profile.sub, "Google account does not belong to an employee");
            return Err(Error::Unauthenticated {
                message: Some(format!("{} is not registered as an employee", profile.email)),
            });
        }
    };

    let token = create_session_token(&employee, &state.config)?;
    info!(employee_id = employee.id, is_admin = employee.is_admin, "Employee signed in");

    Ok(SessionRedirect {
        location: google.post_login_redirect().to_string(),
        cookie: Some(session_cookie(&token, &state.config)),
    })
}

/// Logout (clear session)
#[utoipa::path(
    post,
    path = "/authentication/logout",
    tag = "authentication",
    responses(
        (status = 200, description = "Logout successful", body = AuthSuccessResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn logout(State(state): State<AppState>) -> Result<LogoutResponse> {
    Ok(LogoutResponse {
        auth_response: AuthSuccessResponse {
            message: "Logout successful".to_string(),
        },
        cookie: expired_session_cookie(&state.config),
    })
}

/// The signed-in employee
#[utoipa::path(
    get,
    path = "/authentication/me",
    tag = "authentication",
    responses(
        (status = 200, description = "Current employee", body = CurrentEmployee),
        (status = 401, description = "Not signed in"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn me(employee: CurrentEmployee) -> Json<CurrentEmployee> {
    Json(employee)
}

#[cfg(test)]
mod tests {
    use crate::{
        api::models::auth::CurrentEmployee,
        auth::google::GoogleOAuth,
        config::GoogleAuthConfig,
        test_utils::{
            add_session_cookie, create_test_config, create_test_employee, install_crypto_provider, lazy_test_server,
            test_server_with_state,
        },
    };
    use axum::http::{StatusCode, header};
    use sqlx::PgPool;
    use std::sync::Arc;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    async fn mock_google(email: &str) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "access-123",
                "token_type": "Bearer",
                "expires_in": 3599
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "sub": "42",
                "email": email,
                "email_verified": true
            })))
            .mount(&server)
            .await;
        server
    }

    fn google_for(server: &MockServer) -> Arc<GoogleOAuth> {
        let config = GoogleAuthConfig {
            enabled: true,
            client_id: Some("client".to_string()),
            client_secret: Some("secret".to_string()),
            redirect_url: Some("http://localhost:8080/authentication/google/callback".parse().unwrap()),
            auth_url: format!("{}/auth", server.uri()).parse().unwrap(),
            token_url: format!("{}/token", server.uri()).parse().unwrap(),
            userinfo_url: format!("{}/userinfo", server.uri()).parse().unwrap(),
            post_login_redirect: "/dashboard".to_string(),
            ..Default::default()
        };
        Arc::new(GoogleOAuth::new(&config).unwrap())
    }

    #[tokio::test]
    async fn test_me_requires_session() {
        let server = lazy_test_server();
        server.get("/authentication/me").await.assert_status(StatusCode::UNAUTHORIZED);

        let (name, value) = add_session_cookie(11, false);
        let response = server.get("/authentication/me").add_header(name, value).await;
        response.assert_status_ok();
        let me: CurrentEmployee = response.json();
        assert_eq!(me.id, 11);
        assert!(!me.is_admin);
    }

    #[tokio::test]
    async fn test_logout_clears_cookie() {
        let server = lazy_test_server();
        let response = server.post("/authentication/logout").await;
        response.assert_status_ok();
        let cookie = response.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap().to_string();
        assert!(cookie.starts_with("bobapos_session=;"));
        assert!(cookie.contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn test_google_disabled_is_service_unavailable() {
        let server = lazy_test_server();
        server.get("/authentication/google").await.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_callback_rejects_denied_consent_and_bad_state() {
        install_crypto_provider();
        let google = mock_google("nobody@boba.example").await;
        let mut state = crate::test_utils::lazy_test_state();
        state.google = Some(google_for(&google));
        let server = test_server_with_state(state);

        server
            .get("/authentication/google/callback?error=access_denied")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
        server
            .get("/authentication/google/callback?code=abc")
            .await
            .assert_status(StatusCode::BAD_REQUEST);
        server
            .get("/authentication/google/callback?code=abc&state=forged")
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_login_redirects_to_google() {
        install_crypto_provider();
        let google = mock_google("nobody@boba.example").await;
        let mut state = crate::test_utils::lazy_test_state();
        state.google = Some(google_for(&google));
        let server = test_server_with_state(state);

        let response = server.get("/authentication/google").await;
        response.assert_status(StatusCode::SEE_OTHER);
        let location = response.headers().get(header::LOCATION).unwrap().to_str().unwrap().to_string();
        assert!(location.starts_with(&format!("{}/auth?", google.uri())));
        assert!(location.contains("code_challenge="));
    }

    #[sqlx::test]
    async fn test_callback_signs_in_known_employee_only(pool: PgPool) {
        install_crypto_provider();
        let employee = create_test_employee(&pool, false).await;

        // Known employee, email case differs from the stored one
        let google = mock_google(&employee.email.to_uppercase()).await;
        let oauth = google_for(&google);
        let (_, csrf_state) = oauth.authorize_url().await;
        let state = crate::AppState::builder()
            .db(pool.clone())
            .config(create_test_config())
            .google(oauth)
            .build();
        let server = test_server_with_state(state);

        let response = server
            .get(&format!("/authentication/google/callback?code=abc&state={csrf_state}"))
            .await;
        response.assert_status(StatusCode::SEE_OTHER);
        assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/dashboard");
        let cookie = response.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap().to_string();
        let session = cookie.split(';').next().unwrap().to_string();

        let me: CurrentEmployee = server.get("/authentication/me").add_header("cookie", session).await.json();
        assert_eq!(me.id, employee.id);

        // Unknown account
        let stranger = mock_google("stranger@elsewhere.example").await;
        let oauth = google_for(&stranger);
        let (_, csrf_state) = oauth.authorize_url().await;
        let state = crate::AppState::builder()
            .db(pool.clone())
            .config(create_test_config())
            .google(oauth)
            .build();
        let server = test_server_with_state(state);

        server
            .get(&format!("/authentication/google/callback?code=abc&state={csrf_state}"))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }
}
