// ============================================================================
// Fabric Error Taxonomy
// ============================================================================
//
// Setup-time errors (connection, topology, binding) abort initialization.
// Publish errors surface synchronously to the triggering domain action.
// Consume errors are recovered locally and never propagate as a nack.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum FabricError {
    #[error("broker connection failed: {0}")]
    Connection(String),

    #[error("topology initialization failed: {0}")]
    TopologyInit(String),

    #[error("fabric topology has not been initialized")]
    TopologyNotReady,

    #[error("publish unavailable: {0}")]
    PublishUnavailable(String),

    #[error("queue {queue} declaration rejected: {reason}")]
    QueueDeclare { queue: String, reason: String },

    #[error("failed to bind queue {queue} to exchange {exchange}: {reason}")]
    Binding {
        queue: String,
        exchange: &'static str,
        reason: String,
    },

    #[error("failed to set up consumer on queue {queue}: {reason}")]
    Consume { queue: String, reason: String },

    #[error("payload serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, FabricError>;
