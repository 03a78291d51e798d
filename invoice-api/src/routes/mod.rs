use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::auth::require_auth;
use crate::config::CorsConfig;
use crate::handlers;
use crate::AppState;

/// Creates the main application router.
///
/// Invoice routes sit behind [`require_auth`]; registration, login and the
/// health endpoints are public.
pub fn create_router(state: AppState) -> Router {
    let protected = Router::new()
        .route(
            "/api/invoices",
            post(handlers::create_invoice).get(handlers::list_invoices),
        )
        .route(
            "/api/invoices/:id",
            get(handlers::get_invoice)
                .put(handlers::update_invoice)
                .delete(handlers::delete_invoice),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        // Public routes
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health_check))
        .route("/health/db", get(handlers::db_health_check))
        .route("/api/register", post(handlers::register))
        .route("/api/login", post(handlers::login))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Builds the CORS policy from configuration.
///
/// Credentials are allowed, so "allow all" mirrors the request origin rather
/// than sending `*`.
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origin = if config.allow_all {
        AllowOrigin::mirror_request()
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| match o.parse::<HeaderValue>() {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(origin = %o, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::ORIGIN,
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::AUTHORIZATION,
            HeaderName::from_static("x-requested-with"),
        ])
        .expose_headers([header::CONTENT_LENGTH])
        .allow_credentials(true)
}
