use std::collections::HashSet;
use std::sync::Arc;

use lapin::{
    options::{QueueBindOptions, QueueDeclareOptions},
    types::{AMQPValue, FieldTable},
    Channel,
};

use super::consumer::{self, ConsumerSpec, DigestNote};
use super::error::{FabricError, Result};
use super::routing::{
    customer_fanout_queue, customer_header_queue, Action, ExchangeName, Resource, RoutingKey,
    ServiceName, CUSTOMER_SERVICE_CREATED_QUEUE, CUSTOMER_SERVICE_DELETED_QUEUE,
    CUSTOMER_SERVICE_UPDATED_QUEUE, LOGS_SERVICE_QUEUE, LOGS_WILDCARD,
    ORDER_SERVICE_CREATED_QUEUE, ORDER_SERVICE_DELETED_QUEUE, ORDER_SERVICE_UPDATED_QUEUE,
};
use super::topology::{standard_queue_args, Topology};
use crate::actors::DigestSink;
use crate::config::FabricConfig;
use crate::domain::customer::Customer;
use crate::metrics::Metrics;

// ============================================================================
// Routing Registrar - Queue Declarations and Bindings
// ============================================================================
//
// Computes and installs the fabric's bindings:
// - per-customer header-matched queues (match-all over membership + country)
// - per-customer fanout broadcast queues
// - fixed downstream service queues bound by routing key or wildcard pattern
//
// Bindings are independent of each other, so registration order between
// customers is irrelevant. Every declared queue carries the dead-letter
// arguments from the topology module.
//
// Customers on the configured silent list get their queues declared and bound
// but no consumer attached; their messages age out into the dead-letter
// queue. The list lives in configuration, never in code.
//
// ============================================================================

/// How a fixed service queue binds to its exchange.
#[derive(Debug, Clone, Copy)]
pub enum ServiceBinding {
    Key(RoutingKey),
    Pattern(&'static str),
}

/// Declaration plan for one downstream service queue.
pub struct ServiceQueueSpec {
    pub queue: &'static str,
    pub exchange: ExchangeName,
    pub binding: ServiceBinding,
    pub service: ServiceName,
    pub note: DigestNote,
}

/// The fixed downstream service queues: three direct-bound operational
/// queues, six topic-bound audit queues, and the wildcard logs queue that
/// receives every audit event.
pub fn service_queue_specs() -> Vec<ServiceQueueSpec> {
    vec![
        ServiceQueueSpec {
            queue: ServiceName::Inventory.as_str(),
            exchange: ExchangeName::Direct,
            binding: ServiceBinding::Key(RoutingKey::OrderCreated),
            service: ServiceName::Inventory,
            note: DigestNote::Static("Order Created"),
        },
        ServiceQueueSpec {
            queue: ServiceName::Delivery.as_str(),
            exchange: ExchangeName::Direct,
            binding: ServiceBinding::Key(RoutingKey::OrderShipped),
            service: ServiceName::Delivery,
            note: DigestNote::Static("Order Shipped"),
        },
        ServiceQueueSpec {
            queue: ServiceName::Customer.as_str(),
            exchange: ExchangeName::Direct,
            binding: ServiceBinding::Key(RoutingKey::OrderDelivered),
            service: ServiceName::Customer,
            note: DigestNote::Static("Order Delivered"),
        },
        ServiceQueueSpec {
            queue: ORDER_SERVICE_CREATED_QUEUE,
            exchange: ExchangeName::Topic,
            binding: ServiceBinding::Key(RoutingKey::Logs(Resource::Order, Action::Created)),
            service: ServiceName::Order,
            note: DigestNote::Static("Order Created"),
        },
        ServiceQueueSpec {
            queue: ORDER_SERVICE_UPDATED_QUEUE,
            exchange: ExchangeName::Topic,
            binding: ServiceBinding::Key(RoutingKey::Logs(Resource::Order, Action::Updated)),
            service: ServiceName::Order,
            note: DigestNote::Static("Order Updated"),
        },
        ServiceQueueSpec {
            queue: ORDER_SERVICE_DELETED_QUEUE,
            exchange: ExchangeName::Topic,
            binding: ServiceBinding::Key(RoutingKey::Logs(Resource::Order, Action::Deleted)),
            service: ServiceName::Order,
            note: DigestNote::Static("Order Deleted"),
        },
        ServiceQueueSpec {
            queue: CUSTOMER_SERVICE_CREATED_QUEUE,
            exchange: ExchangeName::Topic,
            binding: ServiceBinding::Key(RoutingKey::Logs(Resource::Customer, Action::Created)),
            service: ServiceName::Customer,
            note: DigestNote::Static("Customer Created"),
        },
        ServiceQueueSpec {
            queue: CUSTOMER_SERVICE_UPDATED_QUEUE,
            exchange: ExchangeName::Topic,
            binding: ServiceBinding::Key(RoutingKey::Logs(Resource::Customer, Action::Updated)),
            service: ServiceName::Customer,
            note: DigestNote::Static("Customer Updated"),
        },
        ServiceQueueSpec {
            queue: CUSTOMER_SERVICE_DELETED_QUEUE,
            exchange: ExchangeName::Topic,
            binding: ServiceBinding::Key(RoutingKey::Logs(Resource::Customer, Action::Deleted)),
            service: ServiceName::Customer,
            note: DigestNote::Static("Customer Deleted"),
        },
        ServiceQueueSpec {
            queue: LOGS_SERVICE_QUEUE,
            exchange: ExchangeName::Topic,
            binding: ServiceBinding::Pattern(LOGS_WILDCARD),
            service: ServiceName::Logs,
            note: DigestNote::DeliveryRoutingKey,
        },
    ]
}

/// Binding arguments for a customer's header-matched queue: the broker only
/// routes a message here when ALL of membership and country match.
pub fn header_binding_args(customer: &Customer) -> FieldTable {
    let mut args = FieldTable::default();
    args.insert("x-match".into(), AMQPValue::LongString("all".into()));
    args.insert(
        "membership".into(),
        AMQPValue::LongString(customer.membership.as_str().into()),
    );
    args.insert(
        "country".into(),
        AMQPValue::LongString(customer.country.as_str().into()),
    );
    args
}

pub struct RoutingRegistrar {
    channel: Channel,
    silent_customers: HashSet<u64>,
    sink: Arc<dyn DigestSink>,
    metrics: Arc<Metrics>,
}

impl RoutingRegistrar {
    /// Requires an initialized topology; there is no way to install bindings
    /// against a degraded fabric.
    pub fn new(
        topology: &Topology,
        config: &FabricConfig,
        sink: Arc<dyn DigestSink>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            channel: topology.channel().clone(),
            silent_customers: config.silent_customers.clone(),
            sink,
            metrics,
        }
    }

    /// The channel can drop after a successful initialization; installing
    /// bindings over a dead channel must fail explicitly, not no-op.
    fn ensure_ready(&self) -> Result<()> {
        if !self.channel.status().connected() {
            return Err(FabricError::TopologyNotReady);
        }
        Ok(())
    }

    /// Declare and bind both queues for one customer and attach consumers.
    pub async fn register_customer(&self, customer: &Customer) -> Result<()> {
        self.ensure_ready()?;

        let header_queue = customer_header_queue(customer);
        self.declare_queue(&header_queue).await?;
        self.bind(
            &header_queue,
            ExchangeName::Headers,
            "",
            header_binding_args(customer),
        )
        .await?;

        if self.silent_customers.contains(&customer.id) {
            tracing::info!(
                customer_id = customer.id,
                queue = %header_queue,
                "Customer is on the silent list, header queue declared without consumer"
            );
        } else {
            self.attach(ConsumerSpec {
                queue: header_queue.clone(),
                service: ServiceName::People,
                note: DigestNote::CustomerAttributes {
                    country: customer.country.clone(),
                    membership: customer.membership.as_str().to_string(),
                },
            })
            .await?;
        }

        // The broadcast queue is consumed even for silent customers; the
        // exclusion applies to the header-matched path only.
        let fanout_queue = customer_fanout_queue(customer);
        self.declare_queue(&fanout_queue).await?;
        self.bind(&fanout_queue, ExchangeName::Fanout, "", FieldTable::default())
            .await?;
        self.attach(ConsumerSpec {
            queue: fanout_queue,
            service: ServiceName::Notification,
            note: DigestNote::CustomerAttributes {
                country: customer.country.clone(),
                membership: customer.membership.as_str().to_string(),
            },
        })
        .await?;

        tracing::info!(
            customer_id = customer.id,
            customer = %customer.name,
            "Registered customer routing"
        );

        Ok(())
    }

    /// Bulk registration for all pre-existing customers at bootstrap.
    pub async fn register_all_customers(&self, customers: &[Customer]) -> Result<()> {
        for customer in customers {
            self.register_customer(customer).await?;
        }

        tracing::info!(count = customers.len(), "Registered all customers");
        Ok(())
    }

    /// Declare and bind the fixed downstream service queues, with consumers.
    pub async fn register_service_queues(&self) -> Result<()> {
        self.ensure_ready()?;

        for spec in service_queue_specs() {
            self.declare_queue(spec.queue).await?;

            let routing_key = match spec.binding {
                ServiceBinding::Key(key) => key.as_str(),
                ServiceBinding::Pattern(pattern) => pattern,
            };
            self.bind(spec.queue, spec.exchange, routing_key, FieldTable::default())
                .await?;

            self.attach(ConsumerSpec {
                queue: spec.queue.to_string(),
                service: spec.service,
                note: spec.note,
            })
            .await?;
        }

        tracing::info!("Registered downstream service queues");
        Ok(())
    }

    async fn declare_queue(&self, name: &str) -> Result<()> {
        self.channel
            .queue_declare(
                name,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                standard_queue_args(),
            )
            .await
            .map_err(|e| FabricError::QueueDeclare {
                queue: name.to_string(),
                reason: e.to_string(),
            })?;

        tracing::debug!(queue = %name, "Declared queue");
        Ok(())
    }

    async fn bind(
        &self,
        queue: &str,
        exchange: ExchangeName,
        routing_key: &str,
        args: FieldTable,
    ) -> Result<()> {
        self.channel
            .queue_bind(
                queue,
                exchange.as_str(),
                routing_key,
                QueueBindOptions::default(),
                args,
            )
            .await
            .map_err(|e| FabricError::Binding {
                queue: queue.to_string(),
                exchange: exchange.as_str(),
                reason: e.to_string(),
            })?;

        tracing::debug!(queue = %queue, exchange = %exchange, routing_key = %routing_key, "Bound queue");
        Ok(())
    }

    async fn attach(&self, spec: ConsumerSpec) -> Result<()> {
        consumer::attach(&self.channel, spec, self.sink.clone(), self.metrics.clone()).await
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::customer::Membership;

    fn customer() -> Customer {
        Customer::new(4, "X", "US", Membership::Gold).unwrap()
    }

    #[test]
    fn test_header_binding_requires_all_attributes() {
        let args = header_binding_args(&customer());
        let inner = args.inner();

        assert_eq!(
            inner.get("x-match"),
            Some(&AMQPValue::LongString("all".into()))
        );
        assert_eq!(
            inner.get("membership"),
            Some(&AMQPValue::LongString("gold".into()))
        );
        assert_eq!(
            inner.get("country"),
            Some(&AMQPValue::LongString("US".into()))
        );
    }

    #[test]
    fn test_service_queue_names_are_stable() {
        let specs = service_queue_specs();
        let names: Vec<&str> = specs.iter().map(|s| s.queue).collect();

        assert_eq!(
            names,
            vec![
                "inventory-service",
                "delivery-service",
                "customer-service",
                "order-service.created",
                "order-service.updated",
                "order-service.deleted",
                "customer-service.created",
                "customer-service.updated",
                "customer-service.deleted",
                "logs-service-q",
            ]
        );
    }

    #[test]
    fn test_direct_queues_bind_to_order_status_keys() {
        let specs = service_queue_specs();
        let direct: Vec<&ServiceQueueSpec> = specs
            .iter()
            .filter(|s| s.exchange == ExchangeName::Direct)
            .collect();

        assert_eq!(direct.len(), 3);
        assert!(direct.iter().all(|s| matches!(
            s.binding,
            ServiceBinding::Key(
                RoutingKey::OrderCreated | RoutingKey::OrderShipped | RoutingKey::OrderDelivered
            )
        )));
    }

    #[test]
    fn test_logs_queue_uses_wildcard_pattern() {
        let specs = service_queue_specs();
        let logs = specs.iter().find(|s| s.queue == "logs-service-q").unwrap();

        assert_eq!(logs.exchange, ExchangeName::Topic);
        assert!(matches!(logs.binding, ServiceBinding::Pattern("logs.*.*")));
        assert!(matches!(logs.note, DigestNote::DeliveryRoutingKey));
    }

    #[test]
    fn test_topic_audit_queues_cover_every_resource_action() {
        let specs = service_queue_specs();
        let keys: Vec<&str> = specs
            .iter()
            .filter_map(|s| match s.binding {
                ServiceBinding::Key(key @ RoutingKey::Logs(_, _)) => Some(key.as_str()),
                _ => None,
            })
            .collect();

        assert_eq!(keys.len(), 6);
        for expected in [
            "logs.order.created",
            "logs.order.updated",
            "logs.order.deleted",
            "logs.customer.created",
            "logs.customer.updated",
            "logs.customer.deleted",
        ] {
            assert!(keys.contains(&expected), "missing {}", expected);
        }
    }
}
