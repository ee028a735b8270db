use lapin::{options::ConfirmSelectOptions, Channel, Connection, ConnectionProperties};

use super::error::{FabricError, Result};

// ============================================================================
// Broker Context - Owned AMQP Connection and Channel
// ============================================================================
//
// One explicitly constructed context object owns the connection and the shared
// channel; every fabric component borrows from it. Lifecycle is explicit:
// connect at bootstrap, close on shutdown. There is no process-wide singleton
// and no implicit connect-on-first-use.
//
// ============================================================================

pub struct BrokerContext {
    connection: Connection,
    channel: Channel,
}

impl BrokerContext {
    /// Connect to the broker and open the shared channel.
    pub async fn connect(url: &str) -> Result<Self> {
        let connection = Connection::connect(url, ConnectionProperties::default())
            .await
            .map_err(|e| FabricError::Connection(e.to_string()))?;

        let channel = connection
            .create_channel()
            .await
            .map_err(|e| FabricError::Connection(e.to_string()))?;

        // Publisher confirms: publish calls await the broker's ack.
        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await
            .map_err(|e| FabricError::Connection(e.to_string()))?;

        tracing::info!(url = %url, "🟢 Connected to broker");

        Ok(Self { connection, channel })
    }

    /// The shared channel. Lapin channels are clonable handles over one AMQP
    /// channel and serialize frame writes internally, so concurrent publish
    /// calls from many call sites are safe.
    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    /// Close the channel and connection in order.
    pub async fn close(self) -> Result<()> {
        self.channel
            .close(200, "shutdown")
            .await
            .map_err(|e| FabricError::Connection(e.to_string()))?;
        self.connection
            .close(200, "shutdown")
            .await
            .map_err(|e| FabricError::Connection(e.to_string()))?;

        tracing::info!("Broker connection closed");
        Ok(())
    }
}
