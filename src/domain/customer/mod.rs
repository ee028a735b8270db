mod errors;
mod value_objects;

pub use errors::CustomerError;
pub use value_objects::Membership;

use serde::{Deserialize, Serialize};

// ============================================================================
// Customer Entity
// ============================================================================
//
// Supplies the attributes that drive per-customer routing: id and name feed
// deterministic queue naming, membership and country feed the header-matched
// binding predicate. Persistence of customer records is owned elsewhere.
//
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: u64,
    pub name: String,
    pub country: String,
    pub membership: Membership,
}

impl Customer {
    /// Build a customer, validating the attributes that end up inside broker
    /// object names.
    pub fn new(
        id: u64,
        name: impl Into<String>,
        country: impl Into<String>,
        membership: Membership,
    ) -> Result<Self, CustomerError> {
        let name = name.into();
        if name.is_empty() {
            return Err(CustomerError::EmptyName);
        }
        // The name is embedded in queue names, which must stay a single token.
        if name.chars().any(char::is_whitespace) {
            return Err(CustomerError::InvalidName(name));
        }

        let country = country.into();
        if country.is_empty() {
            return Err(CustomerError::EmptyCountry);
        }

        Ok(Self {
            id,
            name,
            country,
            membership,
        })
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_customer_creation() {
        let customer = Customer::new(4, "X", "US", Membership::Gold).unwrap();
        assert_eq!(customer.id, 4);
        assert_eq!(customer.name, "X");
        assert_eq!(customer.country, "US");
        assert_eq!(customer.membership, Membership::Gold);
    }

    #[test]
    fn test_empty_name_rejected() {
        let result = Customer::new(1, "", "US", Membership::Bronze);
        assert!(matches!(result, Err(CustomerError::EmptyName)));
    }

    #[test]
    fn test_whitespace_name_rejected() {
        let result = Customer::new(1, "Ada Lovelace", "UK", Membership::Silver);
        assert!(matches!(result, Err(CustomerError::InvalidName(_))));
    }

    #[test]
    fn test_empty_country_rejected() {
        let result = Customer::new(1, "Ada", "", Membership::Silver);
        assert!(matches!(result, Err(CustomerError::EmptyCountry)));
    }

    #[test]
    fn test_customer_round_trips_through_json() {
        let customer = Customer::new(7, "Marta", "ES", Membership::Platinum).unwrap();
        let json = serde_json::to_string(&customer).unwrap();
        let back: Customer = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, customer.id);
        assert_eq!(back.membership, customer.membership);
    }
}
