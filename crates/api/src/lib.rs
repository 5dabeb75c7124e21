//! HTTP API server and composition root for the booking saga service.
//!
//! Provides REST endpoints for bookings and saga inspection, with
//! structured logging (tracing) and Prometheus metrics. All moving
//! parts are wired here with plain constructors: repository, broker,
//! publisher, relay, orchestrator, listener, and the in-process
//! participant workers.

pub mod config;
pub mod error;
pub mod routes;

use std::collections::HashMap;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use domain::InMemoryBookingStore;
use messaging::{
    InMemoryBroker, InMemoryDedupStore, OutboxPublisher, OutboxRelay, RelayConfig,
};
use outbox::{InMemoryOutboxRepository, OutboxRepository};
use saga::services::{InMemoryNotifier, InMemoryPaymentGateway, InMemoryRoomInventory};
use saga::{
    NotificationParticipant, ParticipantHandler, ParticipantWorker, PaymentParticipant,
    ReplyListener, RoomParticipant, SagaOrchestrator, SAGA_TYPE,
};

use config::Config;
use routes::bookings::AppState;

/// Handle over the spawned background tasks. Dropping it does not stop
/// them; call [`Background::shutdown`].
pub struct Background {
    shutdown: tokio::sync::watch::Sender<bool>,
}

impl Background {
    /// Signals the relay, listener, and workers to stop.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/bookings", post(routes::bookings::create))
        .route("/bookings/{id}", get(routes::bookings::get))
        .route("/bookings/{id}/saga", get(routes::bookings::saga_status))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Wires the whole coordination layer around the given outbox
/// repository and spawns its background tasks.
pub fn create_state(
    repository: Arc<dyn OutboxRepository>,
    config: &Config,
) -> (Arc<AppState>, Background) {
    let broker = Arc::new(InMemoryBroker::new());
    let booking_store = Arc::new(InMemoryBookingStore::new());
    let publisher = Arc::new(OutboxPublisher::new(broker.clone(), repository.clone()));
    let orchestrator = Arc::new(SagaOrchestrator::new(
        repository.clone(),
        publisher.clone(),
        booking_store.clone(),
    ));

    let (shutdown, shutdown_rx) = tokio::sync::watch::channel(false);

    let mut relay_config = RelayConfig::new(SAGA_TYPE);
    relay_config.interval = config.relay_interval;
    relay_config.startup_delay = config.relay_startup_delay;
    relay_config.retry_budget = config.outbox_retry_budget;
    let relay = OutboxRelay::new(repository.clone(), publisher, broker.clone(), relay_config);
    {
        let rx = shutdown_rx.clone();
        tokio::spawn(async move { relay.run(rx).await });
    }

    let listener = ReplyListener::new(
        broker.clone(),
        orchestrator.clone(),
        Arc::new(InMemoryDedupStore::new()),
        config.dedup_ttl,
    );
    {
        let rx = shutdown_rx.clone();
        tokio::spawn(async move { listener.run(rx).await });
    }

    // In-process stand-ins for the participant services.
    let handlers: [Arc<dyn ParticipantHandler>; 3] = [
        Arc::new(PaymentParticipant::new(Arc::new(
            InMemoryPaymentGateway::new(),
        ))),
        Arc::new(RoomParticipant::new(Arc::new(InMemoryRoomInventory::new()))),
        Arc::new(NotificationParticipant::new(Arc::new(
            InMemoryNotifier::new(),
        ))),
    ];
    let worker_dedup = Arc::new(InMemoryDedupStore::new());
    for handler in handlers {
        let worker = ParticipantWorker::new(
            handler,
            broker.clone(),
            worker_dedup.clone(),
            config.dedup_ttl,
        );
        let rx = shutdown_rx.clone();
        tokio::spawn(async move { worker.run(rx).await });
    }

    let state = Arc::new(AppState {
        booking_store,
        repository,
        orchestrator,
        sagas: tokio::sync::RwLock::new(HashMap::new()),
    });

    (state, Background { shutdown })
}

/// Creates the default application state over an in-memory outbox store.
pub fn create_default_state(config: &Config) -> (Arc<AppState>, Background) {
    create_state(Arc::new(InMemoryOutboxRepository::new()), config)
}
