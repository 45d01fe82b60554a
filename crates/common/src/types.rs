use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Error returned when a string is not a valid identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdParseError {
    pub kind: &'static str,
    pub value: String,
}

impl std::fmt::Display for IdParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid {} id: {:?}", self.kind, self.value)
    }
}

impl std::error::Error for IdParseError {}

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an identifier from an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the underlying UUID.
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = IdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim())
                    .map(Self)
                    .map_err(|_| IdParseError {
                        kind: $kind,
                        value: s.to_string(),
                    })
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

uuid_id!(
    /// Unique identifier of a committed order record.
    OrderId,
    "order"
);

uuid_id!(
    /// Identifier of a catalog product.
    ProductId,
    "product"
);

uuid_id!(
    /// Identifier of a stored customer.
    CustomerId,
    "customer"
);

uuid_id!(
    /// Identifier of a journaled commit or cancellation intent.
    IntentId,
    "intent"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_ids_are_unique() {
        assert_ne!(OrderId::new(), OrderId::new());
        assert_ne!(ProductId::new(), ProductId::new());
    }

    #[test]
    fn from_uuid_preserves_value() {
        let uuid = Uuid::new_v4();
        assert_eq!(ProductId::from_uuid(uuid).as_uuid(), uuid);
    }

    #[test]
    fn parse_accepts_uuid_and_trims() {
        let uuid = Uuid::new_v4();
        let parsed: CustomerId = format!(" {uuid} ").parse().unwrap();
        assert_eq!(parsed.as_uuid(), uuid);
    }

    #[test]
    fn parse_rejects_garbage_with_kind() {
        let err = "not-an-id".parse::<OrderId>().unwrap_err();
        assert_eq!(err.kind, "order");
        assert_eq!(err.to_string(), "invalid order id: \"not-an-id\"");
    }

    #[test]
    fn serializes_transparently() {
        let id = ProductId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.as_uuid()));
    }
}
