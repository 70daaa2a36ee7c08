//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: repository backend, order lifecycle, payment gateway
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response DTOs and parsing helpers
//! - `errors.rs`: status codes and plain-text error bodies

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

use storedesk_infra::{AppConfig, RepositoryError};

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

use services::AppServices;

/// Build the full HTTP router with the backend chosen by `config`.
pub async fn build_app(config: AppConfig) -> Result<Router, RepositoryError> {
    let services = AppServices::from_config(config).await?;
    Ok(build_app_with(Arc::new(services)))
}

/// Build the router around already wired services.
pub fn build_app_with(services: Arc<AppServices>) -> Router {
    let jwt = Arc::new(storedesk_auth::Hs256JwtValidator::new(
        services.config.jwt_secret.clone().into_bytes(),
    ));
    let auth_state = middleware::AuthState { jwt };

    // Protected routes: bearer token required, store ownership checked per handler.
    let protected = routes::router().route_layer(axum::middleware::from_fn_with_state(
        auth_state,
        middleware::auth_middleware,
    ));

    Router::new()
        .route("/health", get(routes::system::health))
        .nest("/api", protected.merge(routes::public_router()))
        .layer(ServiceBuilder::new().layer(Extension(services)))
}
