//! HTTP route handlers for the marketplace.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                       - Redirect to /ads
//! GET  /health                 - Liveness check
//! GET  /health/ready           - Readiness check (auth provider reachable)
//!
//! # Auth
//! GET  /login                  - Sign-in page
//! POST /login                  - Sign-in action
//! GET  /register?type=         - Registration page (normal | business)
//! POST /register?type=         - Registration action
//! POST /logout                 - Sign-out action
//!
//! # Profile (requires auth)
//! GET  /account                - Redirect to the page of the account's kind
//! GET  /user-profile           - Individual profile
//! GET  /business-dashboard     - Business profile
//!
//! # Advertisements
//! GET  /ads                    - Advertisement list
//! POST /ads                    - Create advertisement (requires auth)
//! GET  /ads/{id}               - Advertisement detail
//! POST /ads/{id}/images        - Upload an image (requires auth, multipart)
//! ```

pub mod ads;
pub mod auth;
pub mod health;
pub mod messages;
pub mod profile;

use std::convert::Infallible;

use axum::{
    Router,
    extract::{DefaultBodyLimit, Request},
    middleware::from_fn,
    response::Redirect,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::middleware::{
    api_rate_limiter, auth_rate_limiter, create_session_layer, request_id_middleware,
};
use crate::state::AppState;

/// Create the auth routes router.
///
/// Only the form posts are rate limited; the two share one quota.
pub fn auth_routes() -> Router<AppState> {
    let limiter = auth_rate_limiter();

    Router::new()
        .route(
            "/login",
            get(auth::login_page).merge(post(auth::login).layer(limiter.clone())),
        )
        .route(
            "/register",
            get(auth::register_page).merge(post(auth::register).layer(limiter)),
        )
        .route("/logout", post(auth::logout))
}

/// Create the profile routes router.
pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/account", get(profile::account))
        .route("/user-profile", get(profile::user_profile))
        .route("/business-dashboard", get(profile::business_dashboard))
}

/// Create the advertisement routes router.
pub fn ad_routes() -> Router<AppState> {
    let limiter = api_rate_limiter();

    Router::new()
        .route(
            "/",
            get(ads::index).merge(post(ads::create).layer(limiter.clone())),
        )
        .route("/{id}", get(ads::show))
        .route(
            "/{id}/images",
            post(ads::upload_image)
                .layer::<_, Infallible>(limiter)
                .layer(DefaultBodyLimit::max(ads::MAX_IMAGE_BYTES)),
        )
}

/// Create all routes for the marketplace.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(|| async { Redirect::to("/ads") }))
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .merge(auth_routes())
        .merge(profile_routes())
        .nest("/ads", ad_routes())
}

/// Build the complete application with its middleware stack.
pub fn app(state: AppState) -> Router {
    let session_layer = create_session_layer(state.config());

    Router::new()
        .merge(routes())
        .layer(session_layer)
        .layer(from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = tracing::field::Empty,
            )
        }))
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}
