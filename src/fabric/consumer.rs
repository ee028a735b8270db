use std::sync::Arc;

use futures_util::StreamExt;
use lapin::{
    options::{BasicAckOptions, BasicConsumeOptions},
    types::FieldTable,
    Channel,
};

use super::error::{FabricError, Result};
use super::routing::ServiceName;
use crate::actors::{DigestEntry, DigestSink};
use crate::metrics::Metrics;

// ============================================================================
// Queue Consumers - Deliver, Audit, Acknowledge
// ============================================================================
//
// One tokio task per queue drains a lapin consumer stream. Every delivery is
// forwarded to the audit digest and acknowledged afterwards, so a crash
// between delivery and the audit write results in redelivery rather than
// silent loss (at-least-once).
//
// A failed audit write is logged and the message is still acknowledged: the
// fabric trades completeness of the digest for queue availability. Unacked
// messages fall to the dead-letter queue once their TTL elapses.
//
// ============================================================================

/// What the audit note for a queue's deliveries looks like.
#[derive(Debug, Clone)]
pub enum DigestNote {
    /// Fixed text, e.g. "Order Created".
    Static(&'static str),
    /// `<country>-<membership>` of the customer the queue belongs to.
    CustomerAttributes { country: String, membership: String },
    /// The routing key the delivery arrived with.
    DeliveryRoutingKey,
}

impl DigestNote {
    pub fn render(&self, routing_key: &str) -> String {
        match self {
            DigestNote::Static(text) => (*text).to_string(),
            DigestNote::CustomerAttributes {
                country,
                membership,
            } => format!("{}-{}", country, membership),
            DigestNote::DeliveryRoutingKey => routing_key.to_string(),
        }
    }
}

/// Everything a consumer task needs to know about its queue.
#[derive(Debug, Clone)]
pub struct ConsumerSpec {
    pub queue: String,
    pub service: ServiceName,
    pub note: DigestNote,
}

/// Start consuming a queue: registers the consumer on the shared channel,
/// then spawns the drain task. Registration failure (e.g. the queue does not
/// exist) is a setup error and propagates.
pub async fn attach(
    channel: &Channel,
    spec: ConsumerSpec,
    sink: Arc<dyn DigestSink>,
    metrics: Arc<Metrics>,
) -> Result<()> {
    let consumer = channel
        .basic_consume(
            &spec.queue,
            &format!("{}-consumer", spec.queue),
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await
        .map_err(|e| FabricError::Consume {
            queue: spec.queue.clone(),
            reason: e.to_string(),
        })?;

    tracing::info!(queue = %spec.queue, service = %spec.service, "Consumer attached");

    tokio::spawn(drain(consumer, spec, sink, metrics));

    Ok(())
}

async fn drain(
    mut consumer: lapin::Consumer,
    spec: ConsumerSpec,
    sink: Arc<dyn DigestSink>,
    metrics: Arc<Metrics>,
) {
    while let Some(delivery) = consumer.next().await {
        match delivery {
            Ok(delivery) => {
                let entry = build_entry(&spec, &delivery.data, delivery.routing_key.as_str());

                // The audit write completes before the ack. A failure here is
                // accepted and logged; the message is acked regardless.
                if let Err(e) = sink.record(entry).await {
                    tracing::error!(
                        queue = %spec.queue,
                        error = %e,
                        "Audit write failed for consumed message"
                    );
                }

                match delivery.ack(BasicAckOptions::default()).await {
                    Ok(()) => metrics.record_consumed(&spec.queue),
                    Err(e) => {
                        tracing::error!(queue = %spec.queue, error = %e, "Failed to ack message");
                    }
                }
            }
            Err(e) => {
                tracing::error!(queue = %spec.queue, error = %e, "Consumer delivery error");
                break;
            }
        }
    }

    tracing::warn!(queue = %spec.queue, "Consumer stream ended");
}

/// Build the digest entry for one delivery. Malformed payload bytes are
/// recorded in lossy string form rather than blocking the queue.
fn build_entry(spec: &ConsumerSpec, data: &[u8], routing_key: &str) -> DigestEntry {
    let payload = String::from_utf8_lossy(data).into_owned();
    let note = spec.note.render(routing_key);
    DigestEntry::new(spec.service, payload, note, spec.queue.clone())
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(note: DigestNote) -> ConsumerSpec {
        ConsumerSpec {
            queue: "logs-service-q".to_string(),
            service: ServiceName::Logs,
            note,
        }
    }

    #[test]
    fn test_static_note() {
        let note = DigestNote::Static("Order Created");
        assert_eq!(note.render("order.created"), "Order Created");
    }

    #[test]
    fn test_customer_attributes_note() {
        let note = DigestNote::CustomerAttributes {
            country: "US".to_string(),
            membership: "gold".to_string(),
        };
        assert_eq!(note.render(""), "US-gold");
    }

    #[test]
    fn test_routing_key_note() {
        let note = DigestNote::DeliveryRoutingKey;
        assert_eq!(note.render("logs.order.updated"), "logs.order.updated");
    }

    #[test]
    fn test_entry_carries_queue_and_service() {
        let entry = build_entry(
            &spec(DigestNote::DeliveryRoutingKey),
            b"{\"id\":1}",
            "logs.customer.created",
        );
        assert_eq!(entry.service_name, "logs-service");
        assert_eq!(entry.queue_name, "logs-service-q");
        assert_eq!(entry.note, "logs.customer.created");
        assert_eq!(entry.payload, "{\"id\":1}");
    }

    #[test]
    fn test_malformed_payload_recorded_lossily() {
        let entry = build_entry(&spec(DigestNote::Static("note")), &[0xff, 0xfe, b'a'], "");
        // Invalid bytes become replacement characters, the message is still
        // auditable and ackable.
        assert!(entry.payload.ends_with('a'));
        assert!(entry.payload.contains('\u{fffd}'));
    }
}
