//! Globally unique identifiers used throughout Dealbook.
//!
//! All entity IDs use UUIDv7, so sorting ids sorts by creation time.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Declares a UUIDv7 newtype with the usual constructors and a
/// prefixed `Display` (`req:…`, `offer:…`).
macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, ":{}"), self.0)
            }
        }
    };
}

uuid_id!(
    /// Identifier of a posted resource request.
    RequestId,
    "req"
);

uuid_id!(
    /// Identifier of an offer made against a request.
    OfferId,
    "offer"
);

uuid_id!(
    /// Identifier of a deal formed from an accepted offer.
    DealId,
    "deal"
);

uuid_id!(
    /// Identifier of a withdrawal against a deal's balance.
    WithdrawalId,
    "wd"
);

uuid_id!(
    /// Identifier of a dispute raised against a withdrawal.
    DisputeId,
    "dispute"
);

uuid_id!(
    /// Unique identifier for a marketplace participant (entrepreneur,
    /// supplier, investor or admin).
    UserId,
    "user"
);

uuid_id!(
    /// The business on whose behalf a request is posted.
    BusinessId,
    "biz"
);

// ---------------------------------------------------------------------------
// EntityRef
// ---------------------------------------------------------------------------

/// A typed reference to any ledger entity. Handed to the policy gate so
/// it can scope authorization to a specific row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum EntityRef {
    Request(RequestId),
    Offer(OfferId),
    Deal(DealId),
    Withdrawal(WithdrawalId),
    Dispute(DisputeId),
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request(id) => write!(f, "{id}"),
            Self::Offer(id) => write!(f, "{id}"),
            Self::Deal(id) => write!(f, "{id}"),
            Self::Withdrawal(id) => write!(f, "{id}"),
            Self::Dispute(id) => write!(f, "{id}"),
        }
    }
}
