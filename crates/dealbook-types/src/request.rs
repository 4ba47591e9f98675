//! Resource request types.
//!
//! A request is a posted need for supply or investment, owned by the
//! entrepreneur who created it. Requests are never deleted, only closed.
//!
//! ## State Machine
//!
//! ```text
//!   ┌──────┐ review ┌──────────────┐
//!   │ OPEN ├───────▶│ UNDER_REVIEW │
//!   └─┬──┬─┘◀───────┴──┬─────┬─────┘
//!     │  │ accept      │     │ accept
//!     │  └──────┐ ┌────┘     │
//!     │         ▼ ▼          │
//!     │   ┌─────────────┐    │
//!     │   │ IN_PROGRESS │    │
//!     │   └──────┬──────┘    │
//!     │          ▼           │
//!     │   ┌───────────┐      │
//!     │   │ COMPLETED │      │
//!     │   └─────┬─────┘      │
//!     ▼         ▼            ▼
//!   ┌──────────────────────────┐
//!   │          CLOSED          │
//!   └──────────────────────────┘
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{BusinessId, DealbookError, OfferId, RequestId, Result, UserId};

/// What the entrepreneur is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    Supply,
    Investment,
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Supply => write!(f, "supply"),
            Self::Investment => write!(f, "investment"),
        }
    }
}

/// Sub-kind of a supply request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupplyKind {
    Product,
    Service,
}

/// Lifecycle status of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Open,
    UnderReview,
    InProgress,
    Completed,
    Closed,
}

impl RequestStatus {
    /// Whether offers may be submitted or accepted in this status.
    #[must_use]
    pub fn accepts_offers(self) -> bool {
        matches!(self, Self::Open | Self::UnderReview)
    }

    /// Can a request move from `self` to `target`?
    ///
    /// `IN_PROGRESS` is only reachable through offer acceptance and is
    /// never left backwards.
    #[must_use]
    pub fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Open, Self::UnderReview)
                | (Self::UnderReview, Self::Open)
                | (Self::Open | Self::UnderReview, Self::InProgress | Self::Closed)
                | (Self::InProgress, Self::Completed)
                | (Self::Completed, Self::Closed)
        )
    }

    /// Terminal: nothing further happens to the request.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        self == Self::Closed
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::UnderReview => write!(f, "under_review"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Completed => write!(f, "completed"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// A posted need for supply or investment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub id: RequestId,
    /// The entrepreneur who owns the request.
    pub owner_id: UserId,
    pub business_id: BusinessId,
    pub kind: RequestKind,
    /// Required for supply requests, absent for investment requests.
    pub supply_kind: Option<SupplyKind>,
    pub title: String,
    pub status: RequestStatus,
    /// Set exactly once, by the offer acceptance that moved the request
    /// to `in_progress`.
    pub accepted_offer_id: Option<OfferId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Request {
    /// Build a fresh `open` request, validating the kind/sub-kind pairing.
    ///
    /// # Errors
    /// Returns `InvalidRequest` if the title is blank or `supply_kind`
    /// does not match `kind`.
    pub fn new(
        owner_id: UserId,
        business_id: BusinessId,
        kind: RequestKind,
        supply_kind: Option<SupplyKind>,
        title: impl Into<String>,
    ) -> Result<Self> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(DealbookError::InvalidRequest {
                reason: "title must not be empty".to_string(),
            });
        }
        match (kind, supply_kind) {
            (RequestKind::Supply, None) => {
                return Err(DealbookError::InvalidRequest {
                    reason: "supply requests need a supply kind".to_string(),
                });
            }
            (RequestKind::Investment, Some(_)) => {
                return Err(DealbookError::InvalidRequest {
                    reason: "investment requests carry no supply kind".to_string(),
                });
            }
            _ => {}
        }

        let now = Utc::now();
        Ok(Self {
            id: RequestId::new(),
            owner_id,
            business_id,
            kind,
            supply_kind,
            title,
            status: RequestStatus::Open,
            accepted_offer_id: None,
            created_at: now,
            updated_at: now,
        })
    }

    #[must_use]
    pub fn is_owned_by(&self, user: UserId) -> bool {
        self.owner_id == user
    }

    /// Move to `target`, enforcing the request state machine.
    ///
    /// # Errors
    /// Returns `InvalidRequestTransition` for an illegal move.
    pub fn transition_to(&mut self, target: RequestStatus) -> Result<()> {
        if !self.status.can_transition_to(target) {
            return Err(DealbookError::InvalidRequestTransition {
                from: self.status,
                to: target,
            });
        }
        self.status = target;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Test helpers.
#[cfg(any(test, feature = "test-helpers"))]
impl Request {
    /// An open investment request for a fresh owner.
    pub fn dummy_investment() -> Self {
        Self::new(
            UserId::new(),
            BusinessId::new(),
            RequestKind::Investment,
            None,
            "Seed round",
        )
        .expect("valid dummy request")
    }

    /// An open product-supply request owned by `owner`.
    pub fn dummy_supply_for(owner: UserId) -> Self {
        Self::new(
            owner,
            BusinessId::new(),
            RequestKind::Supply,
            Some(SupplyKind::Product),
            "Raw materials",
        )
        .expect("valid dummy request")
    }
}
