//! The analytics worker process.
//!
//! Wires the production clients (Redis aggregate store, Kafka event bus,
//! AMQP queues) to the ingestion and notification consumers, plus an
//! optional periodic alert-rule evaluation. Startup retries the whole
//! connection phase with a fixed 5-second delay, up to 10 attempts, and
//! exits non-zero when the budget is spent; the aggregate store inside
//! each attempt additionally gets the linear connection backoff.

use shopstream_alerting::channels::LoggingEmailChannel;
use shopstream_alerting::{AlertRuleEngine, NotificationConsumer};
use shopstream_amqp::AmqpQueue;
use shopstream_core::event_bus::EventBus;
use shopstream_core::message::queues;
use shopstream_core::queue::MessageQueue;
use shopstream_core::store::AggregateStore;
use shopstream_ingestion::EventIngestionConsumer;
use shopstream_kafka::KafkaEventBus;
use shopstream_redis::RedisAggregateStore;
use shopstream_runtime::retry::{RetryPolicy, retry_with_backoff};
use shopstream_runtime::supervisor::ConnectionSupervisor;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing_subscriber::EnvFilter;

mod config;

use config::WorkerConfig;

/// Top-level startup attempts (1 initial + 9 retries).
const STARTUP_RETRIES: usize = 9;
/// Fixed delay between startup attempts.
const STARTUP_DELAY: Duration = Duration::from_secs(5);

struct Clients {
    store: RedisAggregateStore,
    bus: KafkaEventBus,
    queue: AmqpQueue,
}

async fn connect_all(config: &WorkerConfig) -> anyhow::Result<Clients> {
    let supervisor = ConnectionSupervisor::default();

    let store = supervisor
        .establish("aggregate store", || {
            RedisAggregateStore::new(&config.redis_url)
        })
        .await?;

    let bus = KafkaEventBus::builder()
        .brokers(&config.kafka_brokers)
        .consumer_group(&config.consumer_group)
        .build()?;

    let queue = AmqpQueue::connect(&config.amqp_url).await?;

    Ok(Clients { store, bus, queue })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = WorkerConfig::from_env();
    tracing::info!(
        kafka_brokers = %config.kafka_brokers,
        amqp_url = %config.amqp_url,
        redis_url = %config.redis_url,
        consumer_group = %config.consumer_group,
        "starting analytics worker"
    );

    let policy = RetryPolicy::fixed(STARTUP_RETRIES, STARTUP_DELAY);
    let clients = retry_with_backoff(policy, || connect_all(&config))
        .await
        .map_err(|e| anyhow::anyhow!("worker startup failed, giving up: {e}"))?;

    run(&config, clients).await
}

async fn run(config: &WorkerConfig, clients: Clients) -> anyhow::Result<()> {
    let store: Arc<dyn AggregateStore> = Arc::new(clients.store);
    let bus: Arc<dyn EventBus> = Arc::new(clients.bus);
    let queue: Arc<dyn MessageQueue> = Arc::new(clients.queue);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tasks: JoinSet<anyhow::Result<()>> = JoinSet::new();

    let ingestion = EventIngestionConsumer::new(Arc::clone(&bus), Arc::clone(&store));
    let rx = shutdown_rx.clone();
    tasks.spawn(async move { ingestion.run(rx).await.map_err(Into::into) });

    for queue_name in [queues::NOTIFICATIONS, queues::ALERTS, queues::EMAIL] {
        let consumer =
            NotificationConsumer::new(Arc::clone(&queue), Arc::new(LoggingEmailChannel));
        let rx = shutdown_rx.clone();
        tasks.spawn(async move { consumer.run(queue_name, rx).await.map_err(Into::into) });
    }

    if let Some(interval) = config.alert_eval_interval {
        let engine = AlertRuleEngine::new(Arc::clone(&store), Arc::clone(&queue));
        let mut rx = shutdown_rx.clone();
        tasks.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = engine.evaluate().await {
                            tracing::warn!(error = %e, "alert evaluation pass failed");
                        }
                    }
                    changed = rx.changed() => {
                        if changed.is_err() || *rx.borrow() {
                            return Ok(());
                        }
                    }
                }
            }
        });
    }

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received, draining consumers");
            let _ = shutdown_tx.send(true);
        }
        Some(result) = tasks.join_next() => {
            let _ = shutdown_tx.send(true);
            // Bring the remaining consumers down before surfacing.
            while let Some(other) = tasks.join_next().await {
                match other {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        tracing::warn!(error = %e, "consumer exited with error during shutdown");
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "consumer task panicked during shutdown");
                    }
                }
            }
            result??;
            anyhow::bail!("a consumer exited unexpectedly");
        }
    }

    while let Some(result) = tasks.join_next().await {
        result??;
    }

    tracing::info!("analytics worker stopped");
    Ok(())
}
