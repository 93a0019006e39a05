/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use ecometer_api::{app::AppState, config::Config};
/// use ecometer_shared::store::MemoryStore;
/// use std::sync::Arc;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let state = AppState::new(Arc::new(MemoryStore::new()), config)?;
/// let app = ecometer_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{config::Config, error::ApiError, middleware::security::SecurityHeadersLayer};
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::Next,
    response::Response,
    routing::{get, post, put},
    Router,
};
use ecometer_shared::{
    auth::guard::{parse_bearer, AccessGuard},
    services::{CredentialService, LedgerService},
    store::{MetricStore, UserStore},
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// This is cloned for each request handler via Axum's `State` extractor.
/// Every field is an `Arc` or a handle around one.
#[derive(Clone)]
pub struct AppState {
    /// Accounts, login and password setup
    pub credentials: CredentialService,

    /// Metric ledger
    pub ledger: LedgerService,

    /// Bearer token to principal
    pub guard: AccessGuard,

    /// Application configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Creates application state over a store implementing both traits
    pub fn new<S>(store: Arc<S>, config: Config) -> anyhow::Result<Self>
    where
        S: UserStore + MetricStore + 'static,
    {
        Self::from_stores(store.clone(), store, config)
    }

    /// Creates application state from separate user and metric stores
    pub fn from_stores(
        users: Arc<dyn UserStore>,
        metrics: Arc<dyn MetricStore>,
        config: Config,
    ) -> anyhow::Result<Self> {
        let tokens = config.token_issuer()?;

        Ok(Self {
            credentials: CredentialService::new(users.clone(), tokens.clone()),
            ledger: LedgerService::new(metrics),
            guard: AccessGuard::new(tokens, users),
            config: Arc::new(config),
        })
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// Every route is served at the root and again under `/api`:
/// ```text
/// /
/// ├── GET  /                          # Banner (public)
/// ├── GET  /health                    # Health check (public)
/// ├── /auth/
/// │   ├── POST   /login               # Public
/// │   ├── POST   /register            # Admin or developer
/// │   ├── POST   /setup-password      # Authenticated
/// │   ├── GET    /me                  # Authenticated
/// │   ├── GET    /users               # Admin
/// │   ├── PUT    /users/:id           # Admin
/// │   └── DELETE /users/:id           # Admin
/// ├── /metrics
/// │   ├── POST /                      # Authenticated
/// │   ├── GET  /?skip=&limit=&mine=   # Authenticated
/// │   └── POST /sample-data           # Admin or developer
/// ├── GET /projects                   # Authenticated
/// ├── GET /teams                      # Authenticated
/// └── GET /insights                   # Authenticated
/// ```
///
/// # Middleware Stack
///
/// Applied in order (bottom to top):
/// 1. Security headers
/// 2. CORS (tower-http CorsLayer)
/// 3. Logging (tower-http TraceLayer)
/// 4. Authentication (protected routes only)
pub fn build_router(state: AppState) -> Router {
    let routes = api_routes(&state);

    let cors = cors_layer(&state.config);
    let production = state.config.api.production;

    Router::new()
        .merge(routes.clone())
        .nest("/api", routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .layer(SecurityHeadersLayer::new(production))
        .with_state(state)
}

fn api_routes(state: &AppState) -> Router<AppState> {
    use crate::routes;

    // Public, no auth
    let public_routes = Router::new()
        .route("/", get(routes::health::root))
        .route("/health", get(routes::health::health_check))
        .route("/auth/login", post(routes::auth::login));

    let protected_routes = Router::new()
        .route("/auth/register", post(routes::auth::register))
        .route("/auth/setup-password", post(routes::auth::setup_password))
        .route("/auth/me", get(routes::auth::me))
        .route("/auth/users", get(routes::auth::list_users))
        .route(
            "/auth/users/:id",
            put(routes::auth::update_user).delete(routes::auth::delete_user),
        )
        .route(
            "/metrics",
            get(routes::metrics::list_metrics).post(routes::metrics::create_metric),
        )
        .route("/metrics/sample-data", post(routes::metrics::generate_sample_data))
        .route(
            "/metrics/generate-sample-data",
            post(routes::metrics::generate_sample_data),
        )
        .route("/projects", get(routes::projects::list_projects))
        .route("/teams", get(routes::projects::list_teams))
        .route("/insights", get(routes::insights::get_insights))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            jwt_auth_layer,
        ));

    public_routes.merge(protected_routes)
}

fn cors_layer(config: &Config) -> CorsLayer {
    if config.api.cors_origins.iter().any(|origin| origin == "*") {
        // Wildcard origins cannot be combined with credentials
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = config
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
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(3600))
}

/// JWT authentication middleware layer
///
/// Extracts the bearer token, resolves it to an active principal and
/// injects the `Principal` into request extensions.
async fn jwt_auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = parse_bearer(
        req.headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok()),
    )?
    .to_owned();

    let principal = state.guard.authenticate(&token).await?;

    tracing::debug!(user_id = %principal.id(), "Authenticated request");
    req.extensions_mut().insert(principal);

    Ok(next.run(req).await)
}
