//! # bobapos: point-of-sale backend for a boba tea shop
//!
//! `bobapos` serves the REST API behind the shop's register, manager dashboard and customer
//! kiosk. It keeps the menu (products with stock, prices and allergens), records register
//! transactions, manages staff accounts, produces the end-of-day reports and runs a small
//! recommendation chatbot grounded in the current menu.
//!
//! ## Architecture
//!
//! The HTTP layer is [Axum](https://github.com/tokio-rs/axum); everything persistent lives in
//! PostgreSQL and is reached through sqlx.
//!
//! - The **API layer** ([`api`]) exposes the resource endpoints under `/api/v1/*` and staff
//!   sign-in under `/authentication/*`. Menu reads and the chatbot are public; recording
//!   transactions needs any signed-in employee; everything else needs an admin.
//! - The **authentication layer** ([`auth`]) signs staff in with Google (authorization code +
//!   PKCE) and keeps them signed in with a JWT session cookie. Only Google accounts whose email
//!   matches an employee row are let in.
//! - The **database layer** ([`db`]) holds one repository per table plus the report queries.
//!   Money is stored as integer cents and only turned into dollars at the API edge.
//! - The **chatbot** ([`chat`]) embeds the customer's message, ranks menu items by cosine
//!   similarity against stored product embeddings and asks an OpenAI-compatible model for a reply.
//!   Conversations are held in memory and swept when idle.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use bobapos::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = bobapos::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     bobapos::telemetry::init_telemetry(config.enable_otel_export)?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     }).await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Database Setup
//!
//! Migrations are embedded and run on startup:
//!
//! ```no_run
//! # use sqlx::PgPool;
//! # async fn example(pool: PgPool) -> Result<(), sqlx::migrate::MigrateError> {
//! bobapos::migrator().run(&pool).await?;
//! # Ok(())
//! # }
//! ```
//!
//! See the [`config`] module for configuration options.

pub mod api;
pub mod auth;
pub mod chat;
pub mod config;
pub mod db;
pub mod errors;
mod openapi;
pub mod telemetry;
pub mod types;

#[cfg(test)]
mod test_utils;

use crate::{
    auth::google::GoogleOAuth,
    chat::{ChatService, LanguageModel, OpenAiCompatible},
    config::CorsOrigin,
    db::handlers::Employees,
    openapi::ApiDoc,
};
use axum::{
    Json, Router, http,
    http::HeaderValue,
    routing::{get, patch, post},
};
use bon::Builder;
pub use config::Config;
use sqlx::{PgPool, postgres::PgPoolOptions};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::{CancellationToken, DropGuard};
use tower_http::{
    cors::CorsLayer,
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument, warn};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use types::{AllergenId, EmployeeId, ProductId, TransactionId};

/// Application state shared across all request handlers.
///
/// - `db`: PostgreSQL connection pool
/// - `config`: application configuration
/// - `google`: Google sign-in client, when `auth.google.enabled`
/// - `chat`: the recommendation chatbot, when `chat.enabled`
///
/// ```ignore
/// let state = AppState::builder()
///     .db(pool)
///     .config(config)
///     .maybe_chat(chat)
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
    pub google: Option<Arc<GoogleOAuth>>,
    pub chat: Option<Arc<ChatService>>,
}

/// Get the bobapos database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Connect to PostgreSQL with the configured pool settings
pub async fn connect_pool(config: &Config) -> anyhow::Result<PgPool> {
    let settings = &config.database.pool;
    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(settings.acquire_timeout)
        .connect(&config.database.url)
        .await?;
    Ok(pool)
}

/// Run migrations, check the reporting time zone and seed the bootstrap admin.
#[instrument(skip_all)]
async fn setup_database(pool: &PgPool, config: &Config) -> anyhow::Result<()> {
    migrator().run(pool).await?;

    // An unknown zone would otherwise only surface as a 500 on the first report
    sqlx::query("SELECT NOW() AT TIME ZONE $1")
        .bind(&config.reports.timezone)
        .execute(pool)
        .await
        .map_err(|e| anyhow::anyhow!("reports.timezone '{}' is not a valid time zone: {e}", config.reports.timezone))?;

    match config.admin_email.as_deref() {
        Some(email) => {
            let mut conn = pool.acquire().await?;
            let admin = Employees::new(&mut conn)
                .ensure_admin(email, &config.admin_name)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to create initial admin employee: {e}"))?;
            info!(employee_id = admin.id, "Admin employee {} is ready", admin.email);
        }
        None => warn!("No admin_email configured; sign-in will only work for existing employees"),
    }

    Ok(())
}

/// Compute embeddings for every product that lacks one.
///
/// Used by `--embed-products`; admins can also trigger it over HTTP.
pub async fn backfill_embeddings(config: &Config) -> anyhow::Result<usize> {
    let pool = connect_pool(config).await?;
    migrator().run(&pool).await?;

    let model = OpenAiCompatible::new(&config.chat)?;
    let count = chat::embeddings::embed_products(&pool, &model, true).await?;

    pool.close().await;
    Ok(count)
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let mut origins = Vec::new();
    for origin in &config.auth.security.cors.allowed_origins {
        let header_value = match origin {
            CorsOrigin::Wildcard => "*".parse::<HeaderValue>()?,
            CorsOrigin::Url(url) => url.as_str().trim_end_matches('/').parse::<HeaderValue>()?,
        };
        origins.push(header_value);
    }

    let mut cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            http::Method::GET,
            http::Method::POST,
            http::Method::PATCH,
            http::Method::DELETE,
        ])
        .allow_headers([http::header::CONTENT_TYPE])
        .allow_credentials(config.auth.security.cors.allow_credentials)
        .expose_headers(vec![http::header::LOCATION]);

    if let Some(max_age) = config.auth.security.cors.max_age {
        cors = cors.max_age(std::time::Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the application router.
///
/// - `/authentication/*`: Google sign-in, logout, current employee
/// - `/api/v1/*`: the POS API
/// - `/api/docs`, `/api/openapi.json`: API documentation
/// - `/healthz`: liveness
/// - everything else: the frontend from `static_dir`, if configured
#[instrument(skip_all)]
pub fn build_router(state: &AppState) -> anyhow::Result<Router> {
    let auth_routes = Router::new()
        .route("/authentication/google", get(api::handlers::auth::google_login))
        .route("/authentication/google/callback", get(api::handlers::auth::google_callback))
        .route("/authentication/logout", post(api::handlers::auth::logout))
        .route("/authentication/me", get(api::handlers::auth::me))
        .with_state(state.clone());

    let api_routes = Router::new()
        // Menu
        .route(
            "/products",
            get(api::handlers::products::list_products).post(api::handlers::products::create_product),
        )
        .route("/products/by-category", get(api::handlers::products::list_products_by_category))
        .route("/products/embeddings", post(api::handlers::products::embed_products))
        .route(
            "/products/{id}",
            get(api::handlers::products::get_product)
                .patch(api::handlers::products::update_product)
                .delete(api::handlers::products::delete_product),
        )
        .route("/products/{id}/inventory", patch(api::handlers::products::update_inventory))
        .route("/products/{id}/price", patch(api::handlers::products::update_price))
        .route(
            "/allergens",
            get(api::handlers::allergens::list_allergens).post(api::handlers::allergens::create_allergen),
        )
        .route(
            "/allergens/{id}",
            get(api::handlers::allergens::get_allergen)
                .patch(api::handlers::allergens::update_allergen)
                .delete(api::handlers::allergens::delete_allergen),
        )
        // Staff
        .route(
            "/employees",
            get(api::handlers::employees::list_employees).post(api::handlers::employees::create_employee),
        )
        .route(
            "/employees/{id}",
            get(api::handlers::employees::get_employee)
                .patch(api::handlers::employees::update_employee)
                .delete(api::handlers::employees::delete_employee),
        )
        // Register
        .route(
            "/transactions",
            get(api::handlers::transactions::list_transactions).post(api::handlers::transactions::create_transaction),
        )
        .route(
            "/transactions/{id}",
            get(api::handlers::transactions::get_transaction).delete(api::handlers::transactions::delete_transaction),
        )
        // Reports
        .route("/reports/x", get(api::handlers::reports::x_report))
        .route("/reports/z", get(api::handlers::reports::z_report))
        .route("/reports/sales", get(api::handlers::reports::sales_report))
        .route("/reports/product-usage", get(api::handlers::reports::product_usage))
        .route(
            "/reports/product-usage/timeseries",
            get(api::handlers::reports::product_usage_timeseries),
        )
        // Chatbot
        .route("/chat", post(api::handlers::chat::chat))
        .with_state(state.clone());

    let mut router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .route("/api/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .merge(Scalar::with_url("/api/docs", ApiDoc::openapi()))
        .merge(auth_routes)
        .nest("/api/v1", api_routes);

    // Serve the built frontend, falling back to index.html so client-side routes work
    if let Some(static_dir) = &state.config.static_dir {
        debug!("Serving frontend from {}", static_dir.display());
        let spa = ServeDir::new(static_dir).fallback(ServeFile::new(static_dir.join("index.html")));
        router = router.fallback_service(spa);
    }

    let cors_layer = create_cors_layer(&state.config)?;

    let router = router.layer(cors_layer).layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

/// Background tasks that run alongside the HTTP server.
///
/// Currently just the chatbot's conversation sweeper. Dropping this cancels the shutdown token,
/// so tasks never outlive the application.
pub struct BackgroundServices {
    background_tasks: Vec<tokio::task::JoinHandle<()>>,
    shutdown_token: CancellationToken,
    // Pub so that we can disarm it if we want to
    pub drop_guard: Option<DropGuard>,
}

impl BackgroundServices {
    fn start(chat: Option<&ChatService>, config: &Config) -> Self {
        let shutdown_token = CancellationToken::new();
        let mut background_tasks = Vec::new();

        if let Some(chat) = chat {
            background_tasks.push(chat.conversations().spawn_sweeper(
                config.chat.sweep_interval,
                config.chat.conversation_ttl,
                shutdown_token.clone(),
            ));
        }

        Self {
            background_tasks,
            drop_guard: Some(shutdown_token.clone().drop_guard()),
            shutdown_token,
        }
    }

    /// Gracefully shutdown all background tasks
    pub async fn shutdown(mut self) {
        self.shutdown_token.cancel();

        for handle in self.background_tasks.drain(..) {
            if let Err(e) = handle.await {
                warn!("Background task panicked during shutdown: {e}");
            }
        }

        if let Some(guard) = self.drop_guard.take() {
            guard.disarm();
        }
    }
}

/// Build the optional services from configuration
fn build_services(config: &Config) -> anyhow::Result<(Option<Arc<GoogleOAuth>>, Option<Arc<ChatService>>)> {
    let google = if config.auth.google.enabled {
        info!("Google sign-in enabled");
        Some(Arc::new(GoogleOAuth::new(&config.auth.google)?))
    } else {
        info!("Google sign-in disabled; staff cannot sign in until auth.google is configured");
        None
    };

    let chat = if config.chat.enabled {
        let model: Arc<dyn LanguageModel> = Arc::new(OpenAiCompatible::new(&config.chat)?);
        info!(model = %config.chat.completion_model, "Chatbot enabled");
        Some(Arc::new(ChatService::new(model, &config.chat)))
    } else {
        None
    };

    Ok((google, chat))
}

/// The running service: router, shared state and background tasks.
///
/// 1. **Create**: [`Application::new`] connects, migrates, seeds the admin employee and starts
///    background services
/// 2. **Serve**: [`Application::serve`] binds the port and handles requests
/// 3. **Shutdown**: once the shutdown future resolves, background tasks stop and the pool closes
pub struct Application {
    router: Router,
    config: Config,
    pool: PgPool,
    bg_services: BackgroundServices,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        Self::new_with_pool(config, None).await
    }

    /// Like [`Application::new`], reusing an existing pool when one is given
    pub async fn new_with_pool(config: Config, pool: Option<PgPool>) -> anyhow::Result<Self> {
        debug!("Starting bobapos with configuration: {:#?}", config);

        let pool = match pool {
            Some(pool) => pool,
            None => connect_pool(&config).await?,
        };
        setup_database(&pool, &config).await?;

        let (google, chat) = build_services(&config)?;
        let bg_services = BackgroundServices::start(chat.as_deref(), &config);

        let app_state = AppState::builder()
            .db(pool.clone())
            .config(config.clone())
            .maybe_google(google)
            .maybe_chat(chat)
            .build();

        let router = build_router(&app_state)?;

        Ok(Self {
            router,
            config,
            pool,
            bg_services,
        })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> (axum_test::TestServer, BackgroundServices) {
        let server = axum_test::TestServer::new(self.router).expect("Failed to create test server");
        (server, self.bg_services)
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "bobapos listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        self.bg_services.shutdown().await;

        info!("Closing database connections...");
        self.pool.close().await;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        chat::provider::StaticModel,
        test_utils::{create_test_config, lazy_pool, lazy_test_server},
    };
    use axum::http::StatusCode;
    use sqlx::PgPool;
    use std::time::Duration;

    #[tokio::test]
    async fn test_healthz_and_docs() {
        let server = lazy_test_server();

        let response = server.get("/healthz").await;
        response.assert_status_ok();
        assert_eq!(response.text(), "OK");

        let spec: serde_json::Value = server.get("/api/openapi.json").await.json();
        assert_eq!(spec["info"]["title"], "Boba POS API");
        assert!(spec["paths"]["/api/v1/transactions"].is_object());

        server.get("/api/docs").await.assert_status_ok();
    }

    #[tokio::test]
    async fn test_cors_preflight_allows_configured_origin() {
        let server = lazy_test_server();

        let response = server
            .method(http::Method::OPTIONS, "/api/v1/products")
            .add_header("origin", "http://localhost:5173")
            .add_header("access-control-request-method", "POST")
            .await;
        assert_eq!(
            response.headers().get("access-control-allow-origin").unwrap(),
            "http://localhost:5173"
        );
        assert_eq!(response.headers().get("access-control-allow-credentials").unwrap(), "true");
    }

    #[tokio::test]
    async fn test_static_dir_serves_spa_fallback() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>Boba</h1>").unwrap();
        std::fs::write(dir.path().join("app.js"), "console.log('boba')").unwrap();

        let mut config = create_test_config();
        config.static_dir = Some(dir.path().to_path_buf());
        let state = AppState::builder().db(lazy_pool()).config(config).build();
        let server = axum_test::TestServer::new(build_router(&state).unwrap()).unwrap();

        assert_eq!(server.get("/app.js").await.text(), "console.log('boba')");
        assert_eq!(server.get("/manager/reports").await.text(), "<h1>Boba</h1>");
        // API routes are not swallowed by the fallback
        server.get("/api/v1/employees").await.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unknown_route_without_static_dir_is_not_found() {
        let server = lazy_test_server();
        server.get("/manager/reports").await.assert_status(StatusCode::NOT_FOUND);
    }

    #[test_log::test(tokio::test)]
    async fn test_background_services_stop_sweeper() {
        let mut config = create_test_config();
        config.chat.sweep_interval = Duration::from_millis(10);
        let chat = ChatService::new(Arc::new(StaticModel::new(vec![1.0], "hi")), &config.chat);

        let services = BackgroundServices::start(Some(&chat), &config);
        assert_eq!(services.background_tasks.len(), 1);

        tokio::time::timeout(Duration::from_secs(5), services.shutdown())
            .await
            .expect("sweeper should stop on shutdown");
    }

    #[test]
    fn test_optional_services_disabled_by_default() {
        let config = create_test_config();
        let (google, chat) = build_services(&config).unwrap();
        assert!(google.is_none());
        assert!(chat.is_none());
    }

    #[sqlx::test]
    async fn test_application_seeds_admin(pool: PgPool) {
        let mut config = create_test_config();
        config.admin_email = Some("Manager@Boba.Example".to_string());

        let app = Application::new_with_pool(config.clone(), Some(pool.clone())).await.unwrap();
        let (server, _bg) = app.into_test_server();
        server.get("/healthz").await.assert_status_ok();

        // Running setup again must not fail or duplicate the admin
        setup_database(&pool, &config).await.unwrap();

        let mut conn = pool.acquire().await.unwrap();
        let admin = Employees::new(&mut conn)
            .get_by_email("manager@boba.example")
            .await
            .unwrap()
            .expect("admin should be seeded");
        assert!(admin.is_admin);
    }

    #[sqlx::test]
    async fn test_invalid_timezone_fails_startup(pool: PgPool) {
        let mut config = create_test_config();
        config.reports.timezone = "Mars/Olympus_Mons".to_string();

        let err = setup_database(&pool, &config).await.unwrap_err();
        assert!(err.to_string().contains("Mars/Olympus_Mons"));
    }
}
