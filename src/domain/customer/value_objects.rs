use serde::{Deserialize, Serialize};

// ============================================================================
// Customer Value Objects
// ============================================================================

/// Membership level driving per-customer header routing.
///
/// Serialized lowercase because the value travels as an AMQP header and must
/// match the binding criteria byte for byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Membership {
    Bronze,
    Silver,
    Gold,
    Platinum,
}

impl Membership {
    pub fn as_str(&self) -> &'static str {
        match self {
            Membership::Bronze => "bronze",
            Membership::Silver => "silver",
            Membership::Gold => "gold",
            Membership::Platinum => "platinum",
        }
    }
}

impl std::fmt::Display for Membership {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_membership_serializes_lowercase() {
        let json = serde_json::to_string(&Membership::Gold).unwrap();
        assert_eq!(json, "\"gold\"");
    }

    #[test]
    fn test_membership_as_str_matches_serialization() {
        for membership in [
            Membership::Bronze,
            Membership::Silver,
            Membership::Gold,
            Membership::Platinum,
        ] {
            let json = serde_json::to_string(&membership).unwrap();
            assert_eq!(json, format!("\"{}\"", membership.as_str()));
        }
    }
}
