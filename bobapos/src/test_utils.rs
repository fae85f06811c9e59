//! Shared fixtures for unit and HTTP tests.
//!
//! Servers built from [`lazy_test_state`] hold a pool that never connects, so they only suit
//! requests rejected before any query runs (auth, validation, disabled features). Tests that need
//! real rows use `#[sqlx::test]` and [`create_test_server`].

use crate::{
    AppState,
    api::models::auth::CurrentEmployee,
    auth::session::create_session_token,
    chat::{ChatService, provider::StaticModel},
    config::{Config, DatabaseConfig, PoolSettings},
    db::{
        handlers::{Employees, Repository},
        models::employees::{EmployeeCreateDBRequest, EmployeeDBResponse},
    },
    types::EmployeeId,
};
use axum_test::TestServer;
use sqlx::{PgPool, postgres::PgPoolOptions};
use std::sync::{Arc, Once};
use uuid::Uuid;

static CRYPTO_PROVIDER: Once = Once::new();

/// reqwest is built without a default TLS provider, so clients in tests need one installed
pub fn install_crypto_provider() {
    CRYPTO_PROVIDER.call_once(|| {
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
    });
}

pub fn create_test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        database: DatabaseConfig {
            // Will get overriden by the pool handed to the app
            url: "postgres://unused@localhost/unused".to_string(),
            pool: PoolSettings {
                max_connections: 1,
                min_connections: 0,
                ..Default::default()
            },
        },
        admin_email: None,
        secret_key: Some("test-secret-key-for-testing-only".to_string()),
        ..Default::default()
    }
}

/// A pool that only connects on first use
pub fn lazy_pool() -> PgPool {
    PgPoolOptions::new()
        .max_connections(1)
        .connect_lazy("postgres://unused@localhost/unused")
        .expect("lazy pool from a valid URL")
}

pub fn lazy_test_state() -> AppState {
    AppState::builder().db(lazy_pool()).config(create_test_config()).build()
}

pub fn test_server_with_state(state: AppState) -> TestServer {
    let router = crate::build_router(&state).expect("Failed to build router");
    TestServer::new(router).expect("Failed to create test server")
}

pub fn lazy_test_server() -> TestServer {
    test_server_with_state(lazy_test_state())
}

pub fn create_test_server(pool: PgPool) -> TestServer {
    test_server_with_state(AppState::builder().db(pool).config(create_test_config()).build())
}

pub fn create_test_server_with_chat(pool: PgPool, model: Arc<StaticModel>) -> TestServer {
    let config = create_test_config();
    let chat = ChatService::new(model, &config.chat);
    test_server_with_state(AppState::builder().db(pool).config(config).chat(Arc::new(chat)).build())
}

/// `name=token` pair for a `Cookie` header
pub fn session_cookie_header(employee: &CurrentEmployee, config: &Config) -> String {
    let token = create_session_token(employee, config).expect("Failed to create session token");
    format!("{}={}", config.auth.session.cookie_name, token)
}

/// `Cookie` header for a session as the given employee, signed with the test config's key
pub fn add_session_cookie(id: EmployeeId, is_admin: bool) -> (String, String) {
    let employee = CurrentEmployee {
        id,
        name: format!("Employee {id}"),
        email: format!("employee{id}@boba.example"),
        is_admin,
    };
    ("cookie".to_string(), session_cookie_header(&employee, &create_test_config()))
}

pub async fn create_test_employee(pool: &PgPool, is_admin: bool) -> EmployeeDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let suffix = Uuid::new_v4().simple();

    let request = EmployeeCreateDBRequest {
        name: format!("Test Employee {suffix}"),
        email: format!("employee_{suffix}@boba.example"),
        is_admin,
    };

    Employees::new(&mut conn)
        .create(&request)
        .await
        .expect("Failed to create test employee")
}
