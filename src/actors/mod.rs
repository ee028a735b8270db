// ============================================================================
// Actors Module
// ============================================================================
//
// Actor-based infrastructure collaborators. Domain logic stays in plain
// structs; actors are reserved for infrastructure concerns (the audit
// digest). Queue consumers talk to actors through message passing only.
//
// ============================================================================

mod audit;

pub use audit::{
    ActorDigestSink, AuditDigestActor, DigestEntry, DigestSink, DigestStats, GetDigestEntries,
    GetDigestStats, RecordDigest,
};
