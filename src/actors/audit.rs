use std::collections::HashMap;
use std::sync::Arc;

use actix::prelude::*;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::fabric::routing::ServiceName;
use crate::metrics::Metrics;

// ============================================================================
// Audit Digest Actor
// ============================================================================
//
// Durable record of every message actually consumed, independent of the
// operational delivery path. Provides:
// - Append-only storage of digest entries
// - Queryable for inspection
// - Per-service statistics
//
// Entries are immutable once written; there is no update or delete path.
//
// ============================================================================

/// One consumed message, as recorded by a queue consumer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestEntry {
    pub id: Uuid,
    pub service_name: String,
    pub payload: String,
    pub note: String,
    pub queue_name: String,
    pub recorded_at: DateTime<Utc>,
}

impl DigestEntry {
    pub fn new(
        service: ServiceName,
        payload: impl Into<String>,
        note: impl Into<String>,
        queue_name: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            service_name: service.as_str().to_string(),
            payload: payload.into(),
            note: note.into(),
            queue_name: queue_name.into(),
            recorded_at: Utc::now(),
        }
    }
}

pub struct AuditDigestActor {
    entries: Vec<DigestEntry>,
    metrics: Arc<Metrics>,
}

impl AuditDigestActor {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self {
            entries: Vec::new(),
            metrics,
        }
    }
}

impl Actor for AuditDigestActor {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        tracing::info!("AuditDigestActor started - audit digest ready");
    }
}

// ============================================================================
// Messages
// ============================================================================

#[derive(Message, Debug, Clone)]
#[rtype(result = "Result<(), String>")]
pub struct RecordDigest {
    pub entry: DigestEntry,
}

#[derive(Message)]
#[rtype(result = "Result<Vec<DigestEntry>, String>")]
pub struct GetDigestEntries {
    pub limit: usize,
}

#[derive(Message)]
#[rtype(result = "Result<DigestStats, String>")]
pub struct GetDigestStats;

#[derive(Debug, Clone)]
pub struct DigestStats {
    pub total_entries: u64,
    pub by_service: HashMap<String, u64>,
}

// ============================================================================
// Handlers
// ============================================================================

impl Handler<RecordDigest> for AuditDigestActor {
    type Result = Result<(), String>;

    fn handle(&mut self, msg: RecordDigest, _: &mut Self::Context) -> Self::Result {
        tracing::debug!(
            entry_id = %msg.entry.id,
            service = %msg.entry.service_name,
            queue = %msg.entry.queue_name,
            note = %msg.entry.note,
            "Recording digest entry"
        );

        self.metrics.record_digest(&msg.entry.service_name);
        self.entries.push(msg.entry);

        Ok(())
    }
}

impl Handler<GetDigestEntries> for AuditDigestActor {
    type Result = Result<Vec<DigestEntry>, String>;

    fn handle(&mut self, msg: GetDigestEntries, _: &mut Self::Context) -> Self::Result {
        let newest_first = self.entries.iter().rev().take(msg.limit).cloned().collect();
        Ok(newest_first)
    }
}

impl Handler<GetDigestStats> for AuditDigestActor {
    type Result = Result<DigestStats, String>;

    fn handle(&mut self, _msg: GetDigestStats, _: &mut Self::Context) -> Self::Result {
        let mut by_service: HashMap<String, u64> = HashMap::new();
        for entry in &self.entries {
            *by_service.entry(entry.service_name.clone()).or_insert(0) += 1;
        }

        Ok(DigestStats {
            total_entries: self.entries.len() as u64,
            by_service,
        })
    }
}

// ============================================================================
// Digest Sink
// ============================================================================

/// Write side of the audit digest as seen by queue consumers. Consumers hold
/// this instead of an actor address so tests can substitute their own sink.
#[async_trait]
pub trait DigestSink: Send + Sync {
    async fn record(&self, entry: DigestEntry) -> Result<(), String>;
}

/// Sink backed by the running `AuditDigestActor`.
pub struct ActorDigestSink {
    addr: Addr<AuditDigestActor>,
}

impl ActorDigestSink {
    pub fn new(addr: Addr<AuditDigestActor>) -> Self {
        Self { addr }
    }
}

#[async_trait]
impl DigestSink for ActorDigestSink {
    async fn record(&self, entry: DigestEntry) -> Result<(), String> {
        self.addr
            .send(RecordDigest { entry })
            .await
            .map_err(|e| format!("audit digest mailbox error: {}", e))?
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(service: ServiceName, queue: &str) -> DigestEntry {
        DigestEntry::new(service, "{\"id\":1}", "Order Created", queue)
    }

    #[actix::test]
    async fn test_record_and_query() {
        let metrics = Arc::new(Metrics::new().unwrap());
        let addr = AuditDigestActor::new(metrics).start();

        addr.send(RecordDigest {
            entry: entry(ServiceName::Inventory, "inventory-service"),
        })
        .await
        .unwrap()
        .unwrap();

        let entries = addr
            .send(GetDigestEntries { limit: 10 })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].service_name, "inventory-service");
        assert_eq!(entries[0].queue_name, "inventory-service");
    }

    #[actix::test]
    async fn test_stats_count_per_service() {
        let metrics = Arc::new(Metrics::new().unwrap());
        let addr = AuditDigestActor::new(metrics).start();

        for _ in 0..3 {
            addr.send(RecordDigest {
                entry: entry(ServiceName::Order, "order-service.created"),
            })
            .await
            .unwrap()
            .unwrap();
        }
        addr.send(RecordDigest {
            entry: entry(ServiceName::Logs, "logs-service-q"),
        })
        .await
        .unwrap()
        .unwrap();

        let stats = addr.send(GetDigestStats).await.unwrap().unwrap();
        assert_eq!(stats.total_entries, 4);
        assert_eq!(stats.by_service.get("order-service"), Some(&3));
        assert_eq!(stats.by_service.get("logs-service"), Some(&1));
    }

    #[actix::test]
    async fn test_actor_sink_records_through_mailbox() {
        let metrics = Arc::new(Metrics::new().unwrap());
        let addr = AuditDigestActor::new(metrics).start();
        let sink = ActorDigestSink::new(addr.clone());

        sink.record(entry(ServiceName::People, "customer-4-X"))
            .await
            .unwrap();

        let stats = addr.send(GetDigestStats).await.unwrap().unwrap();
        assert_eq!(stats.total_entries, 1);
    }
}
