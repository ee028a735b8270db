use actix::Actor;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod actors;
mod config;
mod domain;
mod fabric;
mod metrics;
mod utils;

use actors::{ActorDigestSink, AuditDigestActor, DigestSink, GetDigestEntries, GetDigestStats};
use config::FabricConfig;
use domain::customer::{Customer, Membership};
use domain::order::{Order, OrderStatus};
use fabric::{BrokerContext, EventPublisher, RoutingRegistrar, Topology};

#[actix::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging with environment-based filtering
    // Default to INFO level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,hares_fabric=debug")),
        )
        .init();

    tracing::info!("🚀 Starting hares event fabric");

    let config = FabricConfig::from_env();

    // === 1. Metrics registry and scrape endpoint ===
    let metrics = Arc::new(metrics::Metrics::new()?);
    let metrics_registry = Arc::new(metrics.registry().clone());
    let metrics_port = config.metrics_port;
    std::thread::spawn(move || {
        let rt = tokio::runtime::Runtime::new().expect("metrics runtime");
        rt.block_on(async {
            if let Err(e) = metrics::start_metrics_server(metrics_registry, metrics_port).await {
                tracing::error!("Metrics server error: {}", e);
            }
        });
    });

    // === 2. Broker context and topology ===
    let broker = BrokerContext::connect(&config.amqp_url).await?;
    let topology = Topology::initialize(&broker).await?;

    // === 3. Audit digest collaborator ===
    let audit = AuditDigestActor::new(metrics.clone()).start();
    let sink: Arc<dyn DigestSink> = Arc::new(ActorDigestSink::new(audit.clone()));

    // === 4. Install bindings for known customers and services ===
    let registrar = RoutingRegistrar::new(&topology, &config, sink, metrics.clone());

    let customers = vec![
        Customer::new(1, "Noor", "NL", Membership::Silver)?,
        Customer::new(2, "Ines", "FR", Membership::Bronze)?,
        Customer::new(3, "Kenji", "JP", Membership::Platinum)?,
        Customer::new(4, "X", "US", Membership::Gold)?,
    ];

    registrar.register_all_customers(&customers).await?;
    registrar.register_service_queues().await?;

    // === 5. Drive a customer/order lifecycle through the fabric ===
    let publisher = EventPublisher::new(&topology, metrics.clone());

    for customer in &customers {
        publisher.publish_customer_created(customer).await?;
    }

    let mut order = Order::new(1001, 1);
    publisher.publish_order_created(&order).await?;
    tracing::info!("✅ Order created: {}", order.id);

    tokio::time::sleep(Duration::from_secs(2)).await;

    order.transition(OrderStatus::Shipped)?;
    publisher.publish_order_status_changed(&order).await?;
    tracing::info!("✅ Order shipped: {}", order.id);

    tokio::time::sleep(Duration::from_secs(2)).await;

    order.transition(OrderStatus::Delivered)?;
    publisher.publish_order_status_changed(&order).await?;
    tracing::info!("✅ Order delivered: {}", order.id);

    // Targeted and broadcast messaging paths
    publisher
        .publish_customer_targeted(
            &customers[3],
            &serde_json::json!({ "offer": "loyalty upgrade" }),
        )
        .await?;
    publisher
        .publish_broadcast(&serde_json::json!({ "notice": "scheduled maintenance at 02:00 UTC" }))
        .await?;

    // === 6. Let consumers drain, then report digest totals ===
    tracing::info!("⏳ Waiting for consumers to drain...");
    tokio::time::sleep(Duration::from_secs(5)).await;

    let stats = audit
        .send(GetDigestStats)
        .await?
        .map_err(anyhow::Error::msg)?;
    tracing::info!(total = stats.total_entries, "🎉 Audit digest totals");
    for (service, count) in &stats.by_service {
        tracing::info!(service = %service, count = count, "Digest entries");
    }

    let recent = audit
        .send(GetDigestEntries { limit: 5 })
        .await?
        .map_err(anyhow::Error::msg)?;
    for entry in &recent {
        tracing::info!(
            service = %entry.service_name,
            queue = %entry.queue_name,
            note = %entry.note,
            "Recent digest entry"
        );
    }

    broker.close().await?;

    Ok(())
}
