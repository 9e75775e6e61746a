use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use rsvp_api::{app, state::{AppState, AuthConfig}};
use rsvp_core::{DataStore, NoopNotifier, Notifier, TimedStore};
use rsvp_registry::EventDetails;
use rsvp_store::{app_config::Config, DbClient, EventProducer, PgStore, RedisClient};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rsvp_api=debug,rsvp_registry=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting RSVP API on port {}", config.server.port);

    // Postgres
    let db = DbClient::new(&config.database)
        .await
        .context("Failed to connect to Postgres")?;
    db.migrate().await.context("Failed to run migrations")?;

    let request_timeout = Duration::from_millis(config.database.request_timeout_ms);
    let store: Arc<dyn DataStore> = Arc::new(TimedStore::new(
        PgStore::new(db.pool.clone(), request_timeout),
        request_timeout,
    ));

    // Redis
    let redis_client = RedisClient::new(&config.redis.url, config.redis.cache_ttl_seconds)
        .await
        .context("Failed to connect to Redis")?;

    // Kafka
    let notifier: Arc<dyn Notifier> = if config.kafka.brokers.is_empty() {
        tracing::warn!("No Kafka brokers configured, invitations will not be sent");
        Arc::new(NoopNotifier)
    } else {
        Arc::new(
            EventProducer::new(&config.kafka.brokers, &config.kafka.invitation_topic)
                .context("Failed to create Kafka producer")?,
        )
    };

    let event = EventDetails {
        date: config.event.date.clone(),
        time: config.event.time.clone(),
        location: config.event.location.clone(),
        rsvp_base_url: config.event.rsvp_base_url.clone(),
    };

    tracing::info!("Reservation model: {:?}", config.registry.reservation_model);
    let app_state = AppState::new(
        store,
        Arc::new(redis_client),
        notifier,
        event,
        config.registry.reservation_model,
        AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
        },
    );

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
