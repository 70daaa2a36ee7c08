//! Service wiring: repository backend, order lifecycle, payment gateway.

use std::convert::Infallible;
use std::sync::Arc;

use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use tokio::sync::mpsc::unbounded_channel;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, info, warn};

use storedesk_core::StoreId;
use storedesk_infra::{
    AppConfig, HostedCheckoutGateway, InMemoryRepository, OrderLifecycle, PaymentGateway,
    PostgresRepository, Repository, RepositoryError,
};

pub struct AppServices {
    pub repository: Arc<dyn Repository>,
    pub lifecycle: OrderLifecycle,
    pub payments: Arc<dyn PaymentGateway>,
    pub config: AppConfig,
}

impl AppServices {
    /// Wire services around an existing repository.
    pub fn new(config: AppConfig, repository: Arc<dyn Repository>) -> Self {
        let payments: Arc<dyn PaymentGateway> = Arc::new(HostedCheckoutGateway::new(
            config.checkout_base_url.clone(),
            config.storefront_url.clone(),
        ));
        Self {
            lifecycle: OrderLifecycle::new(repository.clone()),
            repository,
            payments,
            config,
        }
    }

    pub fn with_payments(mut self, payments: Arc<dyn PaymentGateway>) -> Self {
        self.payments = payments;
        self
    }

    /// Pick the backend from configuration.
    ///
    /// Persistent mode connects to Postgres and applies the schema before
    /// serving; otherwise everything lives in process memory.
    pub async fn from_config(config: AppConfig) -> Result<Self, RepositoryError> {
        let repository: Arc<dyn Repository> = match (&config.database_url, config.use_persistent_stores) {
            (Some(url), true) => {
                let repo = PostgresRepository::connect(url).await?;
                repo.apply_schema().await?;
                info!("using postgres repository");
                Arc::new(repo)
            }
            _ => {
                info!("using in-memory repository");
                Arc::new(InMemoryRepository::new())
            }
        };
        Ok(Self::new(config, repository))
    }
}

/// SSE stream of a store's full order list, re-sent every
/// `order_stream_interval`. Stops once the client goes away.
pub fn order_sse_stream(
    services: Arc<AppServices>,
    store_id: StoreId,
) -> Sse<UnboundedReceiverStream<Result<SseEvent, Infallible>>> {
    let (tx, rx) = unbounded_channel::<Result<SseEvent, Infallible>>();
    let period = services.config.order_stream_interval;

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            if tx.is_closed() {
                break;
            }

            let orders = match services.repository.list_orders(store_id).await {
                Ok(orders) => orders,
                Err(e) => {
                    warn!(store_id = %store_id, error = %e, "order stream query failed");
                    continue;
                }
            };

            let event = match SseEvent::default().event("orders").json_data(&orders) {
                Ok(event) => event,
                Err(e) => {
                    warn!(store_id = %store_id, error = %e, "order stream encode failed");
                    continue;
                }
            };

            if tx.send(Ok(event)).is_err() {
                break;
            }
        }
        debug!(store_id = %store_id, "order stream closed");
    });

    Sse::new(UnboundedReceiverStream::new(rx)).keep_alive(KeepAlive::default())
}
