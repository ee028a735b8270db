use std::sync::Arc;
use std::time::Duration;

use lapin::{
    options::BasicPublishOptions,
    types::{AMQPValue, FieldTable},
    BasicProperties, Channel,
};
use serde::Serialize;

use super::error::{FabricError, Result};
use super::routing::{Action, ExchangeName, Publication, Resource, RoutingKey};
use super::topology::Topology;
use crate::domain::customer::Customer;
use crate::domain::order::{Order, OrderStatus};
use crate::metrics::Metrics;
use crate::utils::{CircuitBreaker, CircuitBreakerError, CircuitState};

// ============================================================================
// Event Publisher
// ============================================================================
//
// Translates domain lifecycle transitions into broker publishes. Which
// exchanges and routing keys an event targets is computed by pure planning
// functions; the publisher serializes the entity once and emits each
// publication over the shared channel.
//
// Publishing is fire-and-forget from the caller's perspective: delivery to
// bound queues is the broker's job. Unavailability is never swallowed. A
// closed channel or open circuit surfaces as `PublishUnavailable` so the
// caller decides whether emission is best-effort.
//
// ============================================================================

const PUBLISH_FAILURE_THRESHOLD: u32 = 5;
const PUBLISH_COOLDOWN: Duration = Duration::from_secs(30);

/// Publications for a customer-created transition: audit path only.
pub fn customer_created_publications() -> Vec<Publication> {
    vec![Publication {
        exchange: ExchangeName::Topic,
        routing_key: RoutingKey::Logs(Resource::Customer, Action::Created),
    }]
}

/// Publications for an order-created transition: operational delivery on the
/// direct exchange plus the audit copy on the topic exchange.
pub fn order_created_publications() -> Vec<Publication> {
    vec![
        Publication {
            exchange: ExchangeName::Direct,
            routing_key: RoutingKey::OrderCreated,
        },
        Publication {
            exchange: ExchangeName::Topic,
            routing_key: RoutingKey::Logs(Resource::Order, Action::Created),
        },
    ]
}

/// Publications for an order status change. Status changes always audit as
/// "updated", never as a status-specific key. Statuses outside the mapping
/// produce no publications at all.
pub fn order_status_publications(status: OrderStatus) -> Vec<Publication> {
    let direct_key = match status {
        OrderStatus::Shipped => RoutingKey::OrderShipped,
        OrderStatus::Delivered => RoutingKey::OrderDelivered,
        _ => return Vec::new(),
    };

    vec![
        Publication {
            exchange: ExchangeName::Direct,
            routing_key: direct_key,
        },
        Publication {
            exchange: ExchangeName::Topic,
            routing_key: RoutingKey::Logs(Resource::Order, Action::Updated),
        },
    ]
}

/// Message headers for a targeted publish: the customer's routable
/// attributes. The header-matched bindings compare against these.
pub fn message_headers(customer: &Customer) -> FieldTable {
    let mut headers = FieldTable::default();
    headers.insert(
        "membership".into(),
        AMQPValue::LongString(customer.membership.as_str().into()),
    );
    headers.insert(
        "country".into(),
        AMQPValue::LongString(customer.country.as_str().into()),
    );
    headers
}

pub struct EventPublisher {
    channel: Channel,
    breaker: CircuitBreaker,
    metrics: Arc<Metrics>,
}

impl EventPublisher {
    /// Requires an initialized topology; publishing against a degraded
    /// fabric is impossible by construction.
    pub fn new(topology: &Topology, metrics: Arc<Metrics>) -> Self {
        Self {
            channel: topology.channel().clone(),
            breaker: CircuitBreaker::new(PUBLISH_FAILURE_THRESHOLD, PUBLISH_COOLDOWN),
            metrics,
        }
    }

    pub async fn publish_customer_created(&self, customer: &Customer) -> Result<()> {
        self.publish_entity(customer, customer_created_publications())
            .await
    }

    pub async fn publish_order_created(&self, order: &Order) -> Result<()> {
        self.publish_entity(order, order_created_publications()).await
    }

    /// Dispatches on the order's current status. Statuses outside the
    /// shipped/delivered mapping publish nothing and return Ok.
    pub async fn publish_order_status_changed(&self, order: &Order) -> Result<()> {
        let publications = order_status_publications(order.status);
        if publications.is_empty() {
            tracing::debug!(
                order_id = order.id,
                status = ?order.status,
                "Order status has no routing key mapping, skipping publish"
            );
            return Ok(());
        }

        self.publish_entity(order, publications).await
    }

    /// Emit a message to the headers exchange, routed to whichever customer
    /// queues match ALL of the customer's attributes.
    pub async fn publish_customer_targeted<T: Serialize>(
        &self,
        customer: &Customer,
        message: &T,
    ) -> Result<()> {
        let payload = serde_json::to_vec(message)?;
        self.publish_raw(
            ExchangeName::Headers,
            "",
            &payload,
            Some(message_headers(customer)),
        )
        .await
    }

    /// Broadcast a message to every customer's fanout queue.
    pub async fn publish_broadcast<T: Serialize>(&self, message: &T) -> Result<()> {
        let payload = serde_json::to_vec(message)?;
        self.publish_raw(ExchangeName::Fanout, "", &payload, None)
            .await
    }

    async fn publish_entity<T: Serialize>(
        &self,
        entity: &T,
        publications: Vec<Publication>,
    ) -> Result<()> {
        let payload = serde_json::to_vec(entity)?;

        for publication in publications {
            self.publish_raw(
                publication.exchange,
                publication.routing_key.as_str(),
                &payload,
                None,
            )
            .await?;
        }

        Ok(())
    }

    async fn publish_raw(
        &self,
        exchange: ExchangeName,
        routing_key: &str,
        payload: &[u8],
        headers: Option<FieldTable>,
    ) -> Result<()> {
        let result = self
            .breaker
            .call(async {
                let mut properties = BasicProperties::default()
                    .with_content_type("application/json".into())
                    .with_delivery_mode(2); // persistent

                if let Some(headers) = headers {
                    properties = properties.with_headers(headers);
                }

                let confirm = self
                    .channel
                    .basic_publish(
                        exchange.as_str(),
                        routing_key,
                        BasicPublishOptions::default(),
                        payload,
                        properties,
                    )
                    .await?;
                confirm.await?;

                Ok::<(), lapin::Error>(())
            })
            .await;

        self.metrics
            .set_circuit_breaker_state(match self.breaker.state().await {
                CircuitState::Closed => 0,
                CircuitState::Open => 1,
                CircuitState::HalfOpen => 2,
            });

        match result {
            Ok(()) => {
                self.metrics.record_publish(exchange.as_str(), routing_key);
                tracing::debug!(
                    exchange = %exchange,
                    routing_key = %routing_key,
                    "Published event"
                );
                Ok(())
            }
            Err(CircuitBreakerError::CircuitOpen) => {
                self.metrics.record_publish_failure("circuit_open");
                tracing::error!(
                    exchange = %exchange,
                    routing_key = %routing_key,
                    "Publish rejected, circuit breaker open"
                );
                Err(FabricError::PublishUnavailable(
                    "circuit breaker open, broker unavailable".to_string(),
                ))
            }
            Err(CircuitBreakerError::OperationFailed(e)) => {
                self.metrics.record_publish_failure("broker_error");
                tracing::error!(
                    exchange = %exchange,
                    routing_key = %routing_key,
                    error = %e,
                    "Publish failed"
                );
                Err(FabricError::PublishUnavailable(e.to_string()))
            }
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::customer::Membership;

    #[test]
    fn test_customer_created_targets_topic_only() {
        let publications = customer_created_publications();
        assert_eq!(publications.len(), 1);
        assert_eq!(publications[0].exchange, ExchangeName::Topic);
        assert_eq!(publications[0].routing_key.as_str(), "logs.customer.created");
    }

    #[test]
    fn test_order_created_dual_publishes() {
        let publications = order_created_publications();
        assert_eq!(publications.len(), 2);
        assert_eq!(publications[0].exchange, ExchangeName::Direct);
        assert_eq!(publications[0].routing_key.as_str(), "order.created");
        assert_eq!(publications[1].exchange, ExchangeName::Topic);
        assert_eq!(publications[1].routing_key.as_str(), "logs.order.created");
    }

    #[test]
    fn test_shipped_audits_as_updated() {
        let publications = order_status_publications(OrderStatus::Shipped);
        assert_eq!(publications.len(), 2);
        assert_eq!(publications[0].routing_key.as_str(), "order.shipped");
        // Never logs.order.shipped: status changes always audit as updated.
        assert_eq!(publications[1].routing_key.as_str(), "logs.order.updated");
    }

    #[test]
    fn test_delivered_audits_as_updated() {
        let publications = order_status_publications(OrderStatus::Delivered);
        assert_eq!(publications[0].routing_key.as_str(), "order.delivered");
        assert_eq!(publications[1].routing_key.as_str(), "logs.order.updated");
    }

    #[test]
    fn test_unmapped_statuses_publish_nothing() {
        assert!(order_status_publications(OrderStatus::Created).is_empty());
        assert!(order_status_publications(OrderStatus::Cancelled).is_empty());
    }

    #[test]
    fn test_message_headers_carry_routable_attributes() {
        let customer = Customer::new(4, "X", "US", Membership::Gold).unwrap();
        let headers = message_headers(&customer);
        let inner = headers.inner();

        assert_eq!(
            inner.get("membership"),
            Some(&AMQPValue::LongString("gold".into()))
        );
        assert_eq!(
            inner.get("country"),
            Some(&AMQPValue::LongString("US".into()))
        );
        // x-match belongs on the binding side, never on the message.
        assert!(inner.get("x-match").is_none());
    }
}
