//! Infrastructure layer: config, persistence, order lifecycle, payments.

pub mod config;
pub mod lifecycle;
pub mod payments;
pub mod repository;

mod integration_tests;

pub use config::{AppConfig, ConfigError};
pub use lifecycle::{LifecycleError, OrderLifecycle, TransitionOutcome, WebhookOutcome};
pub use payments::{CheckoutSession, HostedCheckoutGateway, PaymentError, PaymentEvent, PaymentGateway};
pub use repository::{
    CatalogRepository, InMemoryRepository, OrderRepository, PostgresRepository, Repository,
    RepositoryError, StockAdjustment, UserRepository,
};
