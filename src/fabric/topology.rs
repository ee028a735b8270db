use lapin::{
    options::{ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions},
    types::{AMQPValue, FieldTable},
    Channel,
};

use super::connection::BrokerContext;
use super::error::{FabricError, Result};
use super::routing::{ExchangeName, DEAD_LETTER_QUEUE, DEFAULT_MESSAGE_TTL_MS};

// ============================================================================
// Topology Manager - Exchange and Dead-Letter Declaration
// ============================================================================
//
// Declares the four routing exchanges plus the dead-letter exchange/queue
// pair, once, at fabric startup. AMQP declarations are idempotent against an
// already-consistent broker, so re-running initialization is a no-op.
//
// A `Topology` value only exists after successful initialization; the
// registrar and publisher are constructed from it, so no component can touch
// a degraded fabric without an explicit error path.
//
// ============================================================================

pub struct Topology {
    channel: Channel,
}

impl Topology {
    /// Declare all exchanges and the dead-letter pair.
    ///
    /// Any declaration failure leaves the fabric uninitialized; the caller
    /// gets `TopologyInit` and must not construct dependent components.
    pub async fn initialize(broker: &BrokerContext) -> Result<Self> {
        let channel = broker.channel().clone();

        for exchange in ExchangeName::all() {
            channel
                .exchange_declare(
                    exchange.as_str(),
                    exchange.kind(),
                    ExchangeDeclareOptions {
                        durable: true,
                        ..Default::default()
                    },
                    FieldTable::default(),
                )
                .await
                .map_err(|e| {
                    FabricError::TopologyInit(format!(
                        "exchange {} declaration rejected: {}",
                        exchange, e
                    ))
                })?;

            tracing::debug!(exchange = %exchange, kind = ?exchange.kind(), "Declared exchange");
        }

        // The dead-letter queue itself carries no TTL or dead-letter args;
        // expired messages terminate here.
        channel
            .queue_declare(
                DEAD_LETTER_QUEUE,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| {
                FabricError::TopologyInit(format!("dead-letter queue declaration rejected: {}", e))
            })?;

        channel
            .queue_bind(
                DEAD_LETTER_QUEUE,
                ExchangeName::DeadLetter.as_str(),
                "",
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| {
                FabricError::TopologyInit(format!("dead-letter queue bind rejected: {}", e))
            })?;

        tracing::info!("🟢 Fabric topology initialized");

        Ok(Self { channel })
    }

    pub(crate) fn channel(&self) -> &Channel {
        &self.channel
    }
}

/// Declaration arguments every fabric queue carries: dead-lettering into the
/// single dead-letter exchange, plus a message TTL.
pub fn default_queue_args(ttl_ms: u32) -> FieldTable {
    let mut args = FieldTable::default();
    args.insert(
        "x-dead-letter-exchange".into(),
        AMQPValue::LongString(ExchangeName::DeadLetter.as_str().into()),
    );
    args.insert("x-message-ttl".into(), AMQPValue::LongInt(ttl_ms as i32));
    args
}

/// Queue arguments with the default 10 second TTL.
pub fn standard_queue_args() -> FieldTable {
    default_queue_args(DEFAULT_MESSAGE_TTL_MS)
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_args_point_at_dead_letter_exchange() {
        let args = standard_queue_args();
        let dlx = args.inner().get("x-dead-letter-exchange").unwrap();
        assert_eq!(
            dlx,
            &AMQPValue::LongString("hares.dead-letter".into())
        );
    }

    #[test]
    fn test_default_ttl_is_ten_seconds() {
        let args = standard_queue_args();
        let ttl = args.inner().get("x-message-ttl").unwrap();
        assert_eq!(ttl, &AMQPValue::LongInt(10_000));
    }

    #[test]
    fn test_ttl_override() {
        let args = default_queue_args(2_500);
        let ttl = args.inner().get("x-message-ttl").unwrap();
        assert_eq!(ttl, &AMQPValue::LongInt(2_500));
    }
}
