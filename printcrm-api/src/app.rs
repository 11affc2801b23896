/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use printcrm_api::{app::AppState, config::Config};
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let state = AppState::new(pool, config);
/// let app = printcrm_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{
    config::{Config, IdentityProviderKind},
    error::ErrorResponse,
    middleware::{identity::resolve_identity, security::SecurityHeadersLayer},
};
use axum::{
    body::Body,
    http::{header, HeaderName, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post, put},
    Json, Router,
};
use printcrm_shared::{
    account::{AccountDeleter, AccountStore, PgAccountStore},
    identity::{FixedIdentityProvider, IdentityProvider, SessionIdentityProvider},
};
use sqlx::PgPool;
use std::{any::Any, sync::Arc};
use tower_http::{
    catch_panic::CatchPanicLayer,
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// Cloned for each request handler via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,

    /// Application configuration
    pub config: Arc<Config>,

    /// Ownership-scoped reads and deletes used by export and deletion
    pub store: Arc<dyn AccountStore>,

    /// Resolves callers and removes identities
    pub identity: Arc<dyn IdentityProvider>,

    /// Runs the account deletion cascade
    pub deleter: Arc<AccountDeleter>,
}

impl AppState {
    /// Creates state backed by PostgreSQL with the identity provider the
    /// configuration selects
    pub fn new(db: PgPool, config: Config) -> Self {
        let store: Arc<dyn AccountStore> = Arc::new(PgAccountStore::new(db.clone()));

        let identity: Arc<dyn IdentityProvider> = match config.identity.provider {
            IdentityProviderKind::Session => {
                Arc::new(SessionIdentityProvider::new(db.clone(), config.jwt.secret.clone()))
            }
            IdentityProviderKind::Fixed => Arc::new(
                FixedIdentityProvider::for_user(
                    config.identity.fixed_id,
                    config.identity.fixed_email.clone(),
                )
                .with_pool(db.clone()),
            ),
        };

        Self::with_components(db, config, store, identity)
    }

    /// Creates state around an explicit store and identity provider
    pub fn with_components(
        db: PgPool,
        config: Config,
        store: Arc<dyn AccountStore>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        let deleter = Arc::new(AccountDeleter::new(
            store.clone(),
            identity.clone(),
            config.account.deletion_policy,
        ));

        Self {
            db,
            config: Arc::new(config),
            store,
            identity,
            deleter,
        }
    }

    /// Gets JWT secret for token operations
    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── /health                        # Health check (public)
/// └── /v1/
///     ├── /auth/
///     │   ├── POST   /register       # public
///     │   ├── POST   /login          # public
///     │   ├── POST   /refresh        # public
///     │   ├── POST   /logout
///     │   ├── GET    /me
///     │   ├── PATCH  /profile
///     │   ├── PUT    /password
///     │   ├── GET    /export-data
///     │   └── DELETE /delete-account
///     ├── /customers, /orders, /quotations   # list/create, /:id get/update/delete
///     ├── /payments, /leads, /job-cards      # list/create, /:id update/delete
///     └── /reports/summary
/// ```
///
/// Everything outside `/health` and the three public auth routes passes
/// through [`resolve_identity`].
///
/// # Middleware Stack
///
/// Outermost first: security headers, CORS, request tracing, compression,
/// panic recovery.
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    // Identity is resolved for the routes registered before `route_layer`;
    // the public routes are added after it.
    let auth_routes = Router::new()
        .route("/logout", post(routes::auth::logout))
        .route("/me", get(routes::auth::me))
        .route("/profile", patch(routes::auth::update_profile))
        .route("/password", put(routes::auth::change_password))
        .route("/export-data", get(routes::account::export_data))
        .route("/delete-account", delete(routes::account::delete_account))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            resolve_identity,
        ))
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login))
        .route("/refresh", post(routes::auth::refresh));

    let resource_routes = Router::new()
        .route(
            "/customers",
            get(routes::customers::list_customers).post(routes::customers::create_customer),
        )
        .route(
            "/customers/:id",
            get(routes::customers::get_customer)
                .patch(routes::customers::update_customer)
                .delete(routes::customers::delete_customer),
        )
        .route(
            "/orders",
            get(routes::orders::list_orders).post(routes::orders::create_order),
        )
        .route(
            "/orders/:id",
            get(routes::orders::get_order)
                .patch(routes::orders::update_order)
                .delete(routes::orders::delete_order),
        )
        .route(
            "/quotations",
            get(routes::quotations::list_quotations).post(routes::quotations::create_quotation),
        )
        .route(
            "/quotations/:id",
            get(routes::quotations::get_quotation)
                .patch(routes::quotations::update_quotation)
                .delete(routes::quotations::delete_quotation),
        )
        .route(
            "/payments",
            get(routes::payments::list_payments).post(routes::payments::create_payment),
        )
        .route(
            "/payments/:id",
            patch(routes::payments::update_payment).delete(routes::payments::delete_payment),
        )
        .route(
            "/leads",
            get(routes::leads::list_leads).post(routes::leads::create_lead),
        )
        .route(
            "/leads/:id",
            patch(routes::leads::update_lead).delete(routes::leads::delete_lead),
        )
        .route(
            "/job-cards",
            get(routes::job_cards::list_job_cards).post(routes::job_cards::create_job_card),
        )
        .route(
            "/job-cards/:id",
            patch(routes::job_cards::update_job_card).delete(routes::job_cards::delete_job_card),
        )
        .route("/reports/summary", get(routes::reports::summary))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            resolve_identity,
        ));

    let v1_routes = Router::new()
        .nest("/auth", auth_routes)
        .merge(resource_routes);

    // Configure CORS based on environment
    let cors = if state.config.api.cors_origins.iter().any(|o| o == "*") {
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .expose_headers([
                header::CONTENT_DISPOSITION,
                HeaderName::from_static(crate::routes::account::EXPORT_STATUS_HEADER),
            ])
            .allow_credentials(true)
            .max_age(std::time::Duration::from_secs(3600))
    };

    Router::new()
        .merge(health_routes)
        .nest("/v1", v1_routes)
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(CompressionLayer::new())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}

/// Turns a handler panic into the generic JSON 500
fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response<Body> {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    tracing::error!(panic = %detail, "Handler panicked");

    let body = Json(ErrorResponse {
        error: "Internal server error".to_string(),
        code: "internal_error".to_string(),
        details: None,
    });

    (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
}
