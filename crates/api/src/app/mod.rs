//! HTTP application wiring (Axum router + service wiring).
//!
//! Layout:
//! - `services.rs`: component construction and DI (`AppServices`)
//! - `sessions.rs`: session lifecycle (login/logout/refresh/invalidate)
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response DTOs and JSON mapping helpers
//! - `errors.rs`: the error taxonomy and consistent responses

use std::sync::Arc;

use axum::{http::Method, routing::get, Extension, Router};
use tower::ServiceBuilder;

use filmgate_auth::{PolicyError, SUPERUSER_ROLE};

use crate::middleware::{self, AuthGate};

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;
pub mod sessions;

use services::AppServices;

/// Build the full HTTP router (public entrypoint used by `main.rs` and the
/// black-box tests).
///
/// Gate misconfiguration (an empty allowed-role set) surfaces here, before
/// the process serves a single request.
pub fn build_app(services: Arc<AppServices>) -> Result<Router, PolicyError> {
    let session_gate = AuthGate::access(services.clone());
    let refresh_gate = AuthGate::refresh(services.clone());
    let user_gate = AuthGate::access(services.clone()).bypass([Method::GET]);
    let superuser_gate = AuthGate::access(services.clone())
        .bypass([Method::GET])
        .allow_roles([SUPERUSER_ROLE])?;

    let app = Router::new()
        .route("/health", get(routes::system::health))
        .merge(routes::auth::public_router())
        .merge(routes::auth::session_router().layer(axum::middleware::from_fn_with_state(
            session_gate,
            middleware::guard,
        )))
        .merge(routes::auth::refresh_router().layer(axum::middleware::from_fn_with_state(
            refresh_gate,
            middleware::guard,
        )))
        .merge(routes::users::router().layer(axum::middleware::from_fn_with_state(
            user_gate,
            middleware::guard,
        )))
        .merge(routes::roles::router().layer(axum::middleware::from_fn_with_state(
            superuser_gate,
            middleware::guard,
        )))
        .layer(ServiceBuilder::new().layer(Extension(services)));

    Ok(app)
}
