use axum::{Router, routing::get};

pub mod analytics;
pub mod checkout;
pub mod customers;
pub mod orders;
pub mod stock;
pub mod system;
pub mod webhooks;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .merge(orders::router())
        .merge(stock::router())
        .merge(analytics::router())
        .merge(customers::router())
}

/// Storefront and provider callbacks; no bearer token.
pub fn public_router() -> Router {
    Router::new()
        .merge(checkout::router())
        .merge(webhooks::router())
}
