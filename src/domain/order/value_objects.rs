use serde::{Deserialize, Serialize};

// ============================================================================
// Order Value Objects
// ============================================================================

/// Order lifecycle status.
///
/// Created, Shipped, and Delivered map 1:1 to direct routing keys; every
/// other status produces no broker event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Created,
    Shipped,
    Delivered,
    Cancelled,
}

// ============================================================================
// Unit Tests
// ============================================================================
