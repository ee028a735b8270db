// ============================================================================
// Domain Layer
// ============================================================================
//
// Domain entities whose lifecycle transitions drive the event fabric. Each
// entity has its own subdirectory with:
// - Value objects
// - Errors
// - Entity implementation
//
// This layer knows nothing about the broker; the fabric layer translates
// lifecycle transitions into publishes.
//
// ============================================================================

pub mod customer;
pub mod order;
