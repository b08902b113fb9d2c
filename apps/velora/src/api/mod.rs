//! # VELORA HTTP API Module
//!
//! JSON API over `velora-core`, served with axum.
//!
//! ## Endpoint Groups
//!
//! - `GET /health` - Health check
//! - `/api/auth/` - Registration, login, tokens, profile
//! - `/api/core/` - Home, subscription, notifications, FAQ
//! - `/api/specialists/` - Directory, booking, reviews
//! - `/api/concierge/` - Requests, appointments, services
//! - `/api/wellness-plans/` - Plans, modules, sessions, progress
//! - `/api/admin/` - Staff operations (only when an admin key is configured)
//!
//! ## Security Configuration
//!
//! - `cors_origins` / `VELORA_CORS_ORIGINS`: Comma-separated origins, or "*" for all (default: localhost only)
//! - `rate_limit` / `VELORA_RATE_LIMIT`: Requests per second (default: 100, 0 to disable)
//! - `admin_key` / `VELORA_ADMIN_KEY`: Enables `/api/admin/` behind `X-Api-Key`

pub mod auth;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod types;

pub use auth::AuthUser;
pub use error::{ApiError, ApiJson, ApiResult};
pub use middleware::{GlobalRateLimiter, create_rate_limiter};

use crate::config::AppConfig;
use crate::mailer::{LogMailer, Mailer};
use axum::{
    Router,
    http::{HeaderName, HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, post, put},
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use velora_core::{Store, TokenIssuer, VeloraError};

/// Maximum accepted request body.
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state.
///
/// The store serializes its own writers, so no lock wraps it.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub tokens: Arc<TokenIssuer>,
    pub mailer: Arc<dyn Mailer>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(store: Store, config: AppConfig, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            store: Arc::new(store),
            tokens: Arc::new(config.token_issuer()),
            mailer,
            config: Arc::new(config),
        }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

const CORS_METHODS: [Method; 6] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
    Method::OPTIONS,
];

fn cors_headers() -> [HeaderName; 3] {
    [
        header::CONTENT_TYPE,
        header::AUTHORIZATION,
        HeaderName::from_static(auth::ADMIN_KEY_HEADER),
    ]
}

/// Build the CORS layer from the configured origins.
///
/// - `"*"`: allows all origins, with a warning
/// - unset: localhost only
/// - otherwise: the comma-separated list; invalid entries are skipped
fn build_cors_layer(origins: Option<&str>) -> CorsLayer {
    match origins {
        Some("*") => {
            tracing::warn!(
                "CORS: Allowing ALL origins (VELORA_CORS_ORIGINS=*). This is insecure for production!"
            );
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed_origins: Vec<HeaderValue> = origins
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .filter_map(|s| match s.parse::<HeaderValue>() {
                    Ok(hv) => {
                        tracing::info!("CORS: Allowing origin: {}", s);
                        Some(hv)
                    }
                    Err(e) => {
                        tracing::warn!("CORS: Invalid origin '{}': {}", s, e);
                        None
                    }
                })
                .collect();

            if allowed_origins.is_empty() {
                tracing::warn!(
                    "CORS: No valid origins in VELORA_CORS_ORIGINS, defaulting to localhost only"
                );
                build_localhost_cors()
            } else {
                CorsLayer::new()
                    .allow_origin(allowed_origins)
                    .allow_methods(CORS_METHODS)
                    .allow_headers(cors_headers())
            }
        }
        None => {
            tracing::info!("CORS: No VELORA_CORS_ORIGINS set, defaulting to localhost only");
            build_localhost_cors()
        }
    }
}

fn build_localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost:3000",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8080",
    ]
    .into_iter()
    .filter_map(|origin| origin.parse::<HeaderValue>().ok())
    .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(CORS_METHODS)
        .allow_headers(cors_headers())
}

// =============================================================================
// ROUTES
// =============================================================================

fn auth_routes(demo_login: bool) -> Router<AppState> {
    use handlers::auth as h;

    let router = Router::new()
        .route("/api/auth/register/", post(h::register_handler))
        .route("/api/auth/register/verify/", post(h::verify_handler))
        .route("/api/auth/register/complete/", post(h::complete_handler))
        .route("/api/auth/login/", post(h::login_handler))
        .route("/api/auth/login/otp/", post(h::otp_login_handler))
        .route("/api/auth/logout/", post(h::logout_handler))
        .route("/api/auth/token/refresh/", post(h::refresh_handler))
        .route("/api/auth/resend-otp/", post(h::resend_otp_handler))
        .route("/api/auth/profile/", get(h::profile_handler))
        .route(
            "/api/auth/profile/update/",
            put(h::update_profile_handler).patch(h::update_profile_handler),
        )
        .route(
            "/api/auth/onboarding/complete/",
            post(h::complete_onboarding_handler),
        );

    if demo_login {
        tracing::warn!("Demo login enabled at /api/auth/demo/login/ - do not use in production");
        router.route("/api/auth/demo/login/", post(h::demo_login_handler))
    } else {
        router
    }
}

fn platform_routes() -> Router<AppState> {
    use handlers::platform as h;

    Router::new()
        .route("/api/core/", get(h::home_handler))
        .route(
            "/api/core/subscription/",
            get(h::subscription_handler).post(h::subscribe_handler),
        )
        .route(
            "/api/core/subscription/cancel/",
            post(h::cancel_subscription_handler),
        )
        .route("/api/core/notifications/", get(h::notifications_handler))
        .route(
            "/api/core/notifications/mark-read/",
            post(h::mark_read_handler),
        )
        .route("/api/core/faq/", get(h::faq_handler))
}

fn specialist_routes() -> Router<AppState> {
    use handlers::specialists as h;

    Router::new()
        .route("/api/specialists/", get(h::list_handler))
        .route("/api/specialists/{id}/", get(h::detail_handler))
        .route(
            "/api/specialists/{id}/availability/",
            get(h::availability_handler),
        )
        .route(
            "/api/specialists/category/{name}/",
            get(h::by_category_handler),
        )
        .route("/api/specialists/book/{id}/", post(h::book_handler))
        .route(
            "/api/specialists/reviews/{id}/",
            get(h::reviews_handler).post(h::submit_review_handler),
        )
}

fn concierge_routes() -> Router<AppState> {
    use handlers::concierge as h;

    Router::new()
        .route("/api/concierge/", get(h::dashboard_handler))
        .route("/api/concierge/request/", post(h::create_request_handler))
        .route("/api/concierge/requests/", get(h::requests_handler))
        .route("/api/concierge/requests/{id}/", get(h::request_detail_handler))
        .route(
            "/api/concierge/requests/{id}/cancel/",
            post(h::cancel_request_handler),
        )
        .route(
            "/api/concierge/requests/{id}/rate/",
            post(h::rate_request_handler),
        )
        .route("/api/concierge/appointments/", get(h::appointments_handler))
        .route("/api/concierge/services/", get(h::services_handler))
}

fn plan_routes() -> Router<AppState> {
    use handlers::plans as h;

    Router::new()
        .route("/api/wellness-plans/", get(h::list_handler))
        .route("/api/wellness-plans/create/", post(h::create_handler))
        .route(
            "/api/wellness-plans/{id}/",
            get(h::detail_handler)
                .patch(h::update_handler)
                .delete(h::delete_handler),
        )
        .route(
            "/api/wellness-plans/{id}/progress/",
            get(h::progress_handler).post(h::record_progress_handler),
        )
        .route(
            "/api/wellness-plans/{id}/sessions/",
            get(h::sessions_handler).post(h::add_session_handler),
        )
        .route("/api/wellness-plans/{id}/modules/", post(h::add_module_handler))
        .route(
            "/api/wellness-plans/session/{id}/complete/",
            post(h::complete_session_handler),
        )
}

fn admin_routes(key: Arc<str>) -> Router<AppState> {
    use handlers::admin as h;

    Router::new()
        .route("/api/admin/tiers/", post(h::create_tier_handler))
        .route("/api/admin/categories/", post(h::create_category_handler))
        .route("/api/admin/specialists/", post(h::create_specialist_handler))
        .route(
            "/api/admin/specialists/{id}/availability/",
            post(h::add_availability_handler),
        )
        .route("/api/admin/agents/", post(h::create_agent_handler))
        .route("/api/admin/services/", post(h::create_service_handler))
        .route("/api/admin/appointments/", post(h::schedule_appointment_handler))
        .route(
            "/api/admin/appointments/{id}/status/",
            post(h::appointment_status_handler),
        )
        .route("/api/admin/notes/", post(h::add_note_handler))
        .route("/api/admin/faq/", post(h::create_faq_handler))
        .route("/api/admin/notifications/", post(h::notify_handler))
        .route(
            "/api/admin/requests/{id}/assign/",
            post(h::assign_request_handler),
        )
        .route(
            "/api/admin/requests/{id}/status/",
            post(h::request_status_handler),
        )
        .route(
            "/api/admin/platform/",
            get(h::platform_settings_handler).patch(h::update_platform_handler),
        )
        .layer(axum_middleware::from_fn_with_state(
            key,
            auth::admin_key_middleware,
        ))
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner):
/// 1. Tracing - logs all requests
/// 2. CORS - handles preflight requests
/// 3. Body limit - rejects bodies over 2 MiB
/// 4. Rate limiting - global governor quota (if enabled)
pub fn create_router(state: AppState) -> Router {
    let config = Arc::clone(&state.config);
    let cors = build_cors_layer(config.cors_origins.as_deref());

    let rate_limiter = if config.rate_limit > 0 {
        tracing::info!("Rate limiting enabled: {} requests/second", config.rate_limit);
        Some(create_rate_limiter(config.rate_limit))
    } else {
        tracing::info!("Rate limiting disabled");
        None
    };

    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .merge(auth_routes(config.demo_login))
        .merge(platform_routes())
        .merge(specialist_routes())
        .merge(concierge_routes())
        .merge(plan_routes());

    match config.admin_key.as_deref() {
        Some(key) => {
            tracing::info!("Admin API enabled at /api/admin/");
            router = router.merge(admin_routes(Arc::from(key)));
        }
        None => {
            tracing::warn!(
                "Admin API DISABLED - set VELORA_ADMIN_KEY to manage the catalog over HTTP."
            );
        }
    }

    if let Some(limiter) = rate_limiter {
        router = router.layer(axum_middleware::from_fn_with_state(
            limiter,
            middleware::rate_limit_middleware,
        ));
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(axum::extract::DefaultBodyLimit::max(MAX_BODY_BYTES)),
        )
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Start the HTTP server and run until Ctrl-C.
pub async fn run_server(store: Store, config: AppConfig) -> Result<(), VeloraError> {
    let addr = format!("{}:{}", config.host, config.port);
    let state = AppState::new(store, config, Arc::new(LogMailer));
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| VeloraError::Internal(format!("Bind failed: {}", e)))?;

    tracing::info!("VELORA HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| VeloraError::Internal(format!("Server error: {}", e)))
}
