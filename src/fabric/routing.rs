use lapin::ExchangeKind;

use crate::domain::customer::Customer;

// ============================================================================
// Routing Registry - Exchange, Routing Key, and Queue Naming
// ============================================================================
//
// Every exchange name, routing key, and queue name in the fabric is minted
// here. Publishers and the registrar both go through these types, so a binding
// and the publish that targets it can never drift apart silently.
//
// ============================================================================

/// The five broker-side exchanges the fabric declares.
///
/// Names and kinds are part of the external compatibility contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExchangeName {
    Headers,
    Direct,
    Topic,
    Fanout,
    DeadLetter,
}

impl ExchangeName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExchangeName::Headers => "hares.headers",
            ExchangeName::Direct => "hares.direct",
            ExchangeName::Topic => "hares.topic",
            ExchangeName::Fanout => "hares.fanout",
            ExchangeName::DeadLetter => "hares.dead-letter",
        }
    }

    pub fn kind(&self) -> ExchangeKind {
        match self {
            ExchangeName::Headers => ExchangeKind::Headers,
            ExchangeName::Direct => ExchangeKind::Direct,
            ExchangeName::Topic => ExchangeKind::Topic,
            // Dead-lettered messages are broadcast to everything bound to the
            // dead-letter exchange, so it is a fanout like the broadcast one.
            ExchangeName::Fanout | ExchangeName::DeadLetter => ExchangeKind::Fanout,
        }
    }

    /// All exchanges, in declaration order. The dead-letter exchange must be
    /// declared before any queue references it in x-dead-letter-exchange.
    pub fn all() -> [ExchangeName; 5] {
        [
            ExchangeName::DeadLetter,
            ExchangeName::Headers,
            ExchangeName::Direct,
            ExchangeName::Topic,
            ExchangeName::Fanout,
        ]
    }
}

impl std::fmt::Display for ExchangeName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resource segment of a topic routing key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Order,
    Customer,
}

/// Action segment of a topic routing key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Created,
    Updated,
    Deleted,
}

/// Typed routing keys for the direct and topic exchanges.
///
/// Topic keys follow the fixed grammar `logs.<resource>.<action>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingKey {
    OrderCreated,
    OrderShipped,
    OrderDelivered,
    Logs(Resource, Action),
}

impl RoutingKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoutingKey::OrderCreated => "order.created",
            RoutingKey::OrderShipped => "order.shipped",
            RoutingKey::OrderDelivered => "order.delivered",
            RoutingKey::Logs(Resource::Order, Action::Created) => "logs.order.created",
            RoutingKey::Logs(Resource::Order, Action::Updated) => "logs.order.updated",
            RoutingKey::Logs(Resource::Order, Action::Deleted) => "logs.order.deleted",
            RoutingKey::Logs(Resource::Customer, Action::Created) => "logs.customer.created",
            RoutingKey::Logs(Resource::Customer, Action::Updated) => "logs.customer.updated",
            RoutingKey::Logs(Resource::Customer, Action::Deleted) => "logs.customer.deleted",
        }
    }
}

impl std::fmt::Display for RoutingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wildcard pattern matching every audit key on the topic exchange.
pub const LOGS_WILDCARD: &str = "logs.*.*";

/// Queue that collects expired and rejected messages.
pub const DEAD_LETTER_QUEUE: &str = "hares.dead-letter-queue";

/// Default per-queue message TTL. A message not acknowledged within this
/// window is routed to the dead-letter exchange by the broker.
pub const DEFAULT_MESSAGE_TTL_MS: u32 = 10_000;

/// Downstream services that consume from the fabric and the identity the
/// audit digest records entries under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceName {
    Inventory,
    Delivery,
    Customer,
    Order,
    Logs,
    Notification,
    People,
}

impl ServiceName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceName::Inventory => "inventory-service",
            ServiceName::Delivery => "delivery-service",
            ServiceName::Customer => "customer-service",
            ServiceName::Order => "order-service",
            ServiceName::Logs => "logs-service",
            ServiceName::Notification => "notification-service",
            ServiceName::People => "people-service",
        }
    }
}

impl std::fmt::Display for ServiceName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// Fixed downstream service queue names. The direct-bound ones reuse the
// service name itself; the topic-bound ones carry the action suffix.
pub const ORDER_SERVICE_CREATED_QUEUE: &str = "order-service.created";
pub const ORDER_SERVICE_UPDATED_QUEUE: &str = "order-service.updated";
pub const ORDER_SERVICE_DELETED_QUEUE: &str = "order-service.deleted";
pub const CUSTOMER_SERVICE_CREATED_QUEUE: &str = "customer-service.created";
pub const CUSTOMER_SERVICE_UPDATED_QUEUE: &str = "customer-service.updated";
pub const CUSTOMER_SERVICE_DELETED_QUEUE: &str = "customer-service.deleted";
pub const LOGS_SERVICE_QUEUE: &str = "logs-service-q";

/// Header-matched queue for one customer, named deterministically from the
/// customer identity.
pub fn customer_header_queue(customer: &Customer) -> String {
    format!("customer-{}-{}", customer.id, customer.name)
}

/// Fanout-bound broadcast queue for one customer.
pub fn customer_fanout_queue(customer: &Customer) -> String {
    format!("user-message-{}-{}", customer.id, customer.name)
}

/// A single (exchange, routing key) emission computed for a domain event.
/// One lifecycle transition may fan out to several of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Publication {
    pub exchange: ExchangeName,
    pub routing_key: RoutingKey,
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::customer::{Customer, Membership};

    fn customer() -> Customer {
        Customer::new(4, "X", "US", Membership::Gold).unwrap()
    }

    #[test]
    fn test_exchange_names_are_stable() {
        assert_eq!(ExchangeName::Headers.as_str(), "hares.headers");
        assert_eq!(ExchangeName::Direct.as_str(), "hares.direct");
        assert_eq!(ExchangeName::Topic.as_str(), "hares.topic");
        assert_eq!(ExchangeName::Fanout.as_str(), "hares.fanout");
        assert_eq!(ExchangeName::DeadLetter.as_str(), "hares.dead-letter");
    }

    #[test]
    fn test_one_exchange_per_kind() {
        let all = ExchangeName::all();
        assert_eq!(all.len(), 5);
        // Headers, direct, and topic appear exactly once each; fanout kind is
        // shared by the broadcast and dead-letter exchanges.
        let fanouts = all
            .iter()
            .filter(|e| e.kind() == ExchangeKind::Fanout)
            .count();
        assert_eq!(fanouts, 2);
    }

    #[test]
    fn test_dead_letter_exchange_declared_first() {
        assert_eq!(ExchangeName::all()[0], ExchangeName::DeadLetter);
    }

    #[test]
    fn test_topic_key_grammar() {
        for resource in [Resource::Order, Resource::Customer] {
            for action in [Action::Created, Action::Updated, Action::Deleted] {
                let key = RoutingKey::Logs(resource, action);
                let parts: Vec<&str> = key.as_str().split('.').collect();
                assert_eq!(parts.len(), 3);
                assert_eq!(parts[0], "logs");
            }
        }
    }

    #[test]
    fn test_direct_keys() {
        assert_eq!(RoutingKey::OrderCreated.as_str(), "order.created");
        assert_eq!(RoutingKey::OrderShipped.as_str(), "order.shipped");
        assert_eq!(RoutingKey::OrderDelivered.as_str(), "order.delivered");
    }

    #[test]
    fn test_customer_queue_names_are_deterministic() {
        let c = customer();
        assert_eq!(customer_header_queue(&c), "customer-4-X");
        assert_eq!(customer_fanout_queue(&c), "user-message-4-X");
    }
}
