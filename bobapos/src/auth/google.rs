//! Google sign-in for staff (OAuth2 authorization code flow with PKCE).
//!
//! [`GoogleOAuth::authorize_url`] mints a CSRF state and a PKCE challenge and remembers the
//! verifier for `state_ttl`. The callback hands the state back to
//! [`GoogleOAuth::exchange_code`], which consumes the verifier exactly once, trades the code for
//! an access token and reads the account's profile from the userinfo endpoint.

use crate::{config::GoogleAuthConfig, errors::Error};
use moka::future::Cache;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, Scope,
    TokenResponse, TokenUrl, basic::BasicClient, reqwest::async_http_client,
};
use serde::Deserialize;
use tracing::{info, instrument, warn};
use url::Url;

/// Upper bound on outstanding sign-in attempts
const MAX_PENDING_LOGINS: u64 = 10_000;

/// Profile fields read from Google's userinfo endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleUserInfo {
    pub sub: String,
    pub email: String,
    #[serde(default)]
    pub email_verified: bool,
    pub name: Option<String>,
}

pub struct GoogleOAuth {
    client: BasicClient,
    scopes: Vec<String>,
    userinfo_url: Url,
    http: reqwest::Client,
    post_login_redirect: String,
    /// CSRF state -> PKCE verifier secret
    pending: Cache<String, String>,
}

impl GoogleOAuth {
    pub fn new(config: &GoogleAuthConfig) -> Result<Self, Error> {
        let missing = |field: &str| Error::Internal {
            operation: format!("configure Google sign-in: auth.google.{field} is required"),
        };
        let client_id = config.client_id.clone().ok_or_else(|| missing("client_id"))?;
        let client_secret = config.client_secret.clone().ok_or_else(|| missing("client_secret"))?;
        let redirect_url = config.redirect_url.as_ref().ok_or_else(|| missing("redirect_url"))?;

        let invalid = |e: oauth2::url::ParseError| Error::Internal {
            operation: format!("configure Google sign-in: {e}"),
        };
        let client = BasicClient::new(
            ClientId::new(client_id),
            Some(ClientSecret::new(client_secret)),
            AuthUrl::new(config.auth_url.to_string()).map_err(invalid)?,
            Some(TokenUrl::new(config.token_url.to_string()).map_err(invalid)?),
        )
        .set_redirect_uri(RedirectUrl::new(redirect_url.to_string()).map_err(invalid)?);

        let pending = Cache::builder()
            .max_capacity(MAX_PENDING_LOGINS)
            .time_to_live(config.state_ttl)
            .build();

        Ok(Self {
            client,
            scopes: config.scopes.clone(),
            userinfo_url: config.userinfo_url.clone(),
            http: reqwest::Client::new(),
            post_login_redirect: config.post_login_redirect.clone(),
            pending,
        })
    }

    /// Where the browser lands after a successful sign-in
    pub fn post_login_redirect(&self) -> &str {
        &self.post_login_redirect
    }

    /// Build the consent-screen URL. Returns the URL and the CSRF state embedded in it.
    pub async fn authorize_url(&self) -> (Url, String) {
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let mut request = self
            .client
            .authorize_url(CsrfToken::new_random)
            .set_pkce_challenge(pkce_challenge);
        for scope in &self.scopes {
            request = request.add_scope(Scope::new(scope.clone()));
        }
        let (url, csrf_state) = request.url();

        self.pending
            .insert(csrf_state.secret().clone(), pkce_verifier.secret().clone())
            .await;

        (url, csrf_state.secret().clone())
    }

    /// Complete the flow for a callback carrying `code` and `state`.
    ///
    /// An unknown, expired or already-used state is a 400. A code Google refuses to exchange,
    /// or an unverified address, is a 401.
    #[instrument(skip_all, err)]
    pub async fn exchange_code(&self, code: String, state: &str) -> Result<GoogleUserInfo, Error> {
        // `get` honours the TTL, so read before invalidating
        let verifier = self.pending.get(state).await;
        self.pending.invalidate(state).await;
        let verifier = verifier.ok_or_else(|| Error::BadRequest {
            message: "Sign-in attempt expired or was already used, please try again".to_string(),
        })?;

        let token = self
            .client
            .exchange_code(AuthorizationCode::new(code))
            .set_pkce_verifier(PkceCodeVerifier::new(verifier))
            .request_async(async_http_client)
            .await
            .map_err(|e| {
                warn!("Google token exchange failed: {e}");
                Error::Unauthenticated {
                    message: Some("Google sign-in failed".to_string()),
                }
            })?;

        let user = self.fetch_userinfo(token.access_token().secret()).await?;
        if !user.email_verified {
            warn!(sub = %user.sub, "Google account email is not verified");
            return Err(Error::Unauthenticated {
                message: Some("Google account email is not verified".to_string()),
            });
        }

        info!(sub = %user.sub, "Google sign-in completed");
        Ok(user)
    }

    async fn fetch_userinfo(&self, access_token: &str) -> Result<GoogleUserInfo, Error> {
        let response = self
            .http
            .get(self.userinfo_url.clone())
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| Error::Internal {
                operation: format!("fetch Google userinfo: {e}"),
            })?;

        if !response.status().is_success() {
            return Err(Error::Internal {
                operation: format!("fetch Google userinfo: HTTP {}", response.status()),
            });
        }

        response.json::<GoogleUserInfo>().await.map_err(|e| Error::Internal {
            operation: format!("parse Google userinfo: {e}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::install_crypto_provider;
    use axum::http::StatusCode;
    use std::time::Duration;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{header, method, path},
    };

    fn google_config(server: &MockServer) -> GoogleAuthConfig {
        GoogleAuthConfig {
            enabled: true,
            client_id: Some("client-id".to_string()),
            client_secret: Some("client-secret".to_string()),
            redirect_url: Some("http://localhost:8080/authentication/google/callback".parse().unwrap()),
            auth_url: format!("{}/o/oauth2/v2/auth", server.uri()).parse().unwrap(),
            token_url: format!("{}/token", server.uri()).parse().unwrap(),
            userinfo_url: format!("{}/userinfo", server.uri()).parse().unwrap(),
            ..Default::default()
        }
    }

    async fn mount_token_endpoint(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "access-123",
                "token_type": "Bearer",
                "expires_in": 3599
            })))
            .mount(server)
            .await;
    }

    #[test]
    fn test_missing_credentials_rejected() {
        let config = GoogleAuthConfig {
            enabled: true,
            ..Default::default()
        };
        assert!(GoogleOAuth::new(&config).is_err());
    }

    #[test]
    fn test_post_login_redirect_comes_from_google_config() {
        let server_uri = "http://127.0.0.1:9";
        let config = GoogleAuthConfig {
            enabled: true,
            client_id: Some("client-id".to_string()),
            client_secret: Some("client-secret".to_string()),
            redirect_url: Some("http://localhost:8080/authentication/google/callback".parse().unwrap()),
            token_url: format!("{server_uri}/token").parse().unwrap(),
            post_login_redirect: "/register".to_string(),
            ..Default::default()
        };
        let google = GoogleOAuth::new(&config).unwrap();
        assert_eq!(google.post_login_redirect(), "/register");
    }

    #[tokio::test]
    async fn test_authorize_url_carries_pkce_and_state() {
        install_crypto_provider();
        let server = MockServer::start().await;
        let google = GoogleOAuth::new(&google_config(&server)).unwrap();

        let (url, state) = google.authorize_url().await;
        let query: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();

        assert_eq!(query.get("state"), Some(&state));
        assert_eq!(query.get("client_id").map(String::as_str), Some("client-id"));
        assert_eq!(query.get("code_challenge_method").map(String::as_str), Some("S256"));
        assert_eq!(query.get("scope").map(String::as_str), Some("openid email profile"));
    }

    #[tokio::test]
    async fn test_exchange_code_returns_profile_once() {
        install_crypto_provider();
        let server = MockServer::start().await;
        mount_token_endpoint(&server).await;
        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .and(header("authorization", "Bearer access-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "sub": "1098",
                "email": "Sam@Boba.example",
                "email_verified": true,
                "name": "Sam"
            })))
            .mount(&server)
            .await;

        let google = GoogleOAuth::new(&google_config(&server)).unwrap();
        let (_, state) = google.authorize_url().await;

        let user = google.exchange_code("auth-code".to_string(), &state).await.unwrap();
        assert_eq!(user.email, "Sam@Boba.example");
        assert_eq!(user.name.as_deref(), Some("Sam"));

        // The state is single use
        let err = google.exchange_code("auth-code".to_string(), &state).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_state_is_bad_request() {
        install_crypto_provider();
        let server = MockServer::start().await;
        let google = GoogleOAuth::new(&google_config(&server)).unwrap();

        let err = google.exchange_code("code".to_string(), "forged").await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_expired_state_is_bad_request() {
        install_crypto_provider();
        let server = MockServer::start().await;
        let config = GoogleAuthConfig {
            state_ttl: Duration::from_millis(50),
            ..google_config(&server)
        };
        let google = GoogleOAuth::new(&config).unwrap();
        let (_, state) = google.authorize_url().await;

        tokio::time::sleep(Duration::from_millis(200)).await;
        let err = google.exchange_code("code".to_string(), &state).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unverified_email_rejected() {
        install_crypto_provider();
        let server = MockServer::start().await;
        mount_token_endpoint(&server).await;
        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "sub": "5",
                "email": "someone@boba.example",
                "email_verified": false
            })))
            .mount(&server)
            .await;

        let google = GoogleOAuth::new(&google_config(&server)).unwrap();
        let (_, state) = google.authorize_url().await;

        let err = google.exchange_code("code".to_string(), &state).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_refused_code_is_unauthenticated() {
        install_crypto_provider();
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant"
            })))
            .mount(&server)
            .await;

        let google = GoogleOAuth::new(&google_config(&server)).unwrap();
        let (_, state) = google.authorize_url().await;

        let err = google.exchange_code("stale".to_string(), &state).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }
}
