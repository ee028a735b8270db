mod errors;
mod value_objects;

pub use errors::OrderError;
pub use value_objects::OrderStatus;

use serde::{Deserialize, Serialize};

// ============================================================================
// Order Entity
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: u64,
    pub customer_id: u64,
    pub status: OrderStatus,
}

impl Order {
    pub fn new(id: u64, customer_id: u64) -> Self {
        Self {
            id,
            customer_id,
            status: OrderStatus::Created,
        }
    }

    /// Advance the order through its lifecycle.
    ///
    /// Allowed transitions: Created -> Shipped -> Delivered, and Created ->
    /// Cancelled. A cancelled order never changes again.
    pub fn transition(&mut self, to: OrderStatus) -> Result<(), OrderError> {
        use OrderStatus::*;

        match (self.status, to) {
            (Cancelled, _) => return Err(OrderError::Cancelled),
            (Created, Shipped) | (Shipped, Delivered) | (Created, Cancelled) => {}
            (from, to) => return Err(OrderError::InvalidTransition { from, to }),
        }

        self.status = to;
        Ok(())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_order_starts_created() {
        let order = Order::new(1, 10);
        assert_eq!(order.status, OrderStatus::Created);
    }

    #[test]
    fn test_full_lifecycle() {
        let mut order = Order::new(1, 10);
        order.transition(OrderStatus::Shipped).unwrap();
        order.transition(OrderStatus::Delivered).unwrap();
        assert_eq!(order.status, OrderStatus::Delivered);
    }

    #[test]
    fn test_cannot_deliver_before_shipping() {
        let mut order = Order::new(1, 10);
        let result = order.transition(OrderStatus::Delivered);
        assert!(matches!(
            result,
            Err(OrderError::InvalidTransition {
                from: OrderStatus::Created,
                to: OrderStatus::Delivered,
            })
        ));
    }

    #[test]
    fn test_cancelled_order_is_frozen() {
        let mut order = Order::new(1, 10);
        order.transition(OrderStatus::Cancelled).unwrap();
        let result = order.transition(OrderStatus::Shipped);
        assert!(matches!(result, Err(OrderError::Cancelled)));
    }
}
