// ============================================================================
// Customer Business Rule Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum CustomerError {
    #[error("Customer name cannot be empty")]
    EmptyName,

    #[error("Customer name cannot contain whitespace: {0:?}")]
    InvalidName(String),

    #[error("Customer country cannot be empty")]
    EmptyCountry,
}
