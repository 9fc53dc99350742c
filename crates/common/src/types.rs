use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Declares a UUID-backed identifier newtype.
///
/// Each identifier is its own type so a `VariantId` can never be passed where
/// a `ProductId` is expected, even though both are UUIDs on the wire.
macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
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
    /// Authenticated principal identifier, issued by the auth subsystem.
    UserId
);
uuid_id!(
    /// Shopping cart identifier.
    CartId
);
uuid_id!(
    /// Cart line identifier.
    CartLineId
);
uuid_id!(
    /// Catalog product identifier.
    ProductId
);
uuid_id!(
    /// Catalog variant (SKU-level) identifier.
    VariantId
);
uuid_id!(
    /// Inventory location identifier.
    LocationId
);
uuid_id!(
    /// Inventory movement identifier.
    MovementId
);
uuid_id!(
    /// Order identifier.
    OrderId
);
uuid_id!(
    /// Order item identifier.
    OrderItemId
);
uuid_id!(
    /// Payment transaction identifier.
    TransactionId
);
