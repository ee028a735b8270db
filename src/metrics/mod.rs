// Private module declaration
mod server;

use prometheus::{IntCounterVec, IntGauge, Opts, Registry};

// Re-export for public API
pub use server::start_metrics_server;

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// Provides metrics for:
// - Event publishing (per exchange/routing key, failures by reason)
// - Message consumption (per queue)
// - Audit digest writes (per service)
// - Publish circuit breaker state
//
// All metrics are registered with Prometheus and can be scraped via /metrics
// ============================================================================

/// Central metrics registry for the fabric.
pub struct Metrics {
    registry: Registry,

    pub events_published: IntCounterVec,
    pub publish_failures: IntCounterVec,
    pub messages_consumed: IntCounterVec,
    pub digest_entries: IntCounterVec,
    pub circuit_breaker_state: IntGauge,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let events_published = IntCounterVec::new(
            Opts::new(
                "fabric_events_published_total",
                "Total events published to the broker",
            ),
            &["exchange", "routing_key"],
        )?;
        registry.register(Box::new(events_published.clone()))?;

        let publish_failures = IntCounterVec::new(
            Opts::new(
                "fabric_publish_failures_total",
                "Total publish attempts that surfaced an error",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(publish_failures.clone()))?;

        let messages_consumed = IntCounterVec::new(
            Opts::new(
                "fabric_messages_consumed_total",
                "Total messages delivered and acknowledged",
            ),
            &["queue"],
        )?;
        registry.register(Box::new(messages_consumed.clone()))?;

        let digest_entries = IntCounterVec::new(
            Opts::new(
                "fabric_digest_entries_total",
                "Total audit digest entries recorded",
            ),
            &["service"],
        )?;
        registry.register(Box::new(digest_entries.clone()))?;

        let circuit_breaker_state = IntGauge::new(
            "fabric_circuit_breaker_state",
            "Publish circuit breaker state (0=Closed, 1=Open, 2=HalfOpen)",
        )?;
        registry.register(Box::new(circuit_breaker_state.clone()))?;

        Ok(Self {
            registry,
            events_published,
            publish_failures,
            messages_consumed,
            digest_entries,
            circuit_breaker_state,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_publish(&self, exchange: &str, routing_key: &str) {
        self.events_published
            .with_label_values(&[exchange, routing_key])
            .inc();
    }

    pub fn record_publish_failure(&self, reason: &str) {
        self.publish_failures.with_label_values(&[reason]).inc();
    }

    pub fn record_consumed(&self, queue: &str) {
        self.messages_consumed.with_label_values(&[queue]).inc();
    }

    pub fn record_digest(&self, service: &str) {
        self.digest_entries.with_label_values(&[service]).inc();
    }

    pub fn set_circuit_breaker_state(&self, state: u8) {
        self.circuit_breaker_state.set(state as i64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        assert!(metrics.registry.gather().len() > 0);
    }

    #[test]
    fn test_record_publish() {
        let metrics = Metrics::new().unwrap();
        metrics.record_publish("hares.direct", "order.created");
        metrics.record_publish("hares.topic", "logs.order.created");

        let gathered = metrics.registry.gather();
        let published = gathered
            .iter()
            .find(|m| m.name() == "fabric_events_published_total")
            .unwrap();
        assert_eq!(published.metric.len(), 2);
    }

    #[test]
    fn test_record_consumed_and_digest() {
        let metrics = Metrics::new().unwrap();
        metrics.record_consumed("inventory-service");
        metrics.record_consumed("inventory-service");
        metrics.record_digest("inventory-service");

        let gathered = metrics.registry.gather();
        let consumed = gathered
            .iter()
            .find(|m| m.name() == "fabric_messages_consumed_total")
            .unwrap();
        assert_eq!(consumed.metric[0].counter.value, Some(2.0));
    }

    #[test]
    fn test_circuit_breaker_gauge() {
        let metrics = Metrics::new().unwrap();
        metrics.set_circuit_breaker_state(1);

        let gathered = metrics.registry.gather();
        let state = gathered
            .iter()
            .find(|m| m.name() == "fabric_circuit_breaker_state")
            .unwrap();
        assert_eq!(state.metric[0].gauge.value, Some(1.0));
    }
}
