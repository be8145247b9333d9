pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use axum::{
    extract::State,
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Json, Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    metrics::metrics_middleware,
    rate_limit::{create_ip_rate_limiter, ip_rate_limit_middleware, IpRateLimiter},
    security_headers::security_headers_middleware,
    tracing::{make_http_span, request_id_middleware},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use std::{sync::Arc, time::Duration};

use crate::config::GuestAuthConfig;
use crate::services::{AuthSettings, GuestAuthService, GuestAuthStore, MagicLinkMailer};

#[derive(Clone)]
pub struct AppState {
    pub config: GuestAuthConfig,
    pub auth_service: GuestAuthService,
    pub email_match_rate_limiter: IpRateLimiter,
    pub magic_link_rate_limiter: IpRateLimiter,
    pub ip_rate_limiter: IpRateLimiter,
}

impl AppState {
    /// Wire the auth service and per-route limiters from configuration.
    pub fn new(
        config: GuestAuthConfig,
        store: Arc<dyn GuestAuthStore>,
        mailer: Arc<dyn MagicLinkMailer>,
    ) -> Self {
        let settings = AuthSettings {
            session_ttl_hours: config.session.ttl_hours,
            magic_link_ttl_minutes: config.magic_link.ttl_minutes,
            public_base_url: config.magic_link.public_base_url.clone(),
        };

        let email_match_rate_limiter = create_ip_rate_limiter(
            config.rate_limit.auth_attempts,
            config.rate_limit.auth_window_seconds,
        );
        let magic_link_rate_limiter = create_ip_rate_limiter(
            config.rate_limit.auth_attempts,
            config.rate_limit.auth_window_seconds,
        );
        let ip_rate_limiter = create_ip_rate_limiter(
            config.rate_limit.global_ip_limit,
            config.rate_limit.global_ip_window_seconds,
        );

        Self {
            auth_service: GuestAuthService::new(store, mailer, settings),
            config,
            email_match_rate_limiter,
            magic_link_rate_limiter,
            ip_rate_limiter,
        }
    }
}

/// Periodically delete expired sessions until the runtime shuts down.
pub fn spawn_session_purge(
    auth_service: GuestAuthService,
    every: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        // The first tick completes immediately.
        interval.tick().await;
        loop {
            interval.tick().await;
            if let Err(e) = auth_service.purge_expired_sessions().await {
                tracing::error!(error = %e, "Expired session purge failed");
            }
        }
    })
}

pub async fn build_router(state: AppState) -> Result<Router, AppError> {
    let email_match_route = Router::new()
        .route("/api/guest-auth/email-match", post(handlers::email_match))
        .layer(from_fn_with_state(
            state.email_match_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let magic_link_route = Router::new()
        .route(
            "/api/guest-auth/magic-link/request",
            post(handlers::request_magic_link),
        )
        .route("/api/guest-auth/magic-link", post(handlers::request_magic_link))
        .layer(from_fn_with_state(
            state.magic_link_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let guest_routes = Router::new()
        .route("/api/guest/session", get(handlers::current_session))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::guest_session_middleware,
        ));

    let allowed_origins = state
        .config
        .security
        .allowed_origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::error!("Invalid CORS origin '{}': {}. Skipping.", o, e);
                None
            }
        })
        .collect::<Vec<HeaderValue>>();

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(handlers::metrics::metrics))
        .route(
            "/api/guest-auth/magic-link/verify",
            get(handlers::verify_magic_link_query).post(handlers::verify_magic_link_form),
        )
        .route("/api/guest-auth/logout", post(handlers::logout))
        .merge(email_match_route)
        .merge(magic_link_route)
        .merge(guest_routes)
        .with_state(state.clone())
        // Global IP rate limiting
        .layer(from_fn_with_state(
            state.ip_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ))
        .layer(from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(make_http_span))
        // Runs before the trace span is created so the span carries the id
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(allowed_origins)
                .allow_credentials(true)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([header::CONTENT_TYPE, header::ACCEPT]),
        );

    Ok(app)
}

/// Liveness: the process is up.
pub async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": state.config.service_name,
        "version": state.config.service_version,
    }))
}

/// Readiness: the store answers.
pub async fn readiness_check(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.auth_service.store().health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Store health check failed");
        AppError::ServiceUnavailable
    })?;

    Ok(Json(serde_json::json!({
        "status": "ready",
        "checks": { "database": "up" }
    })))
}
