//! Offer types.
//!
//! An offer is a counterparty's proposed terms against a request. Many
//! offers reference one request; at most one of them is ever `accepted`.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{DealbookError, OfferId, RequestId, RequestKind, Result, UserId};

/// Reason recorded on offers closed by a competing acceptance.
pub const SUPERSEDED: &str = "superseded";
/// Reason recorded when the request owner rejects an offer.
pub const REJECTED_BY_OWNER: &str = "rejected by owner";
/// Reason recorded when the offeror retracts their own offer.
pub const WITHDRAWN_BY_OFFEROR: &str = "withdrawn by offeror";
/// Reason recorded on offers closed together with their request.
pub const REQUEST_CLOSED: &str = "request closed";

/// Whether the offer proposes to supply or to invest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferType {
    Supply,
    Investment,
}

impl OfferType {
    /// The request kind this offer type answers.
    #[must_use]
    pub fn answers(self, kind: RequestKind) -> bool {
        matches!(
            (self, kind),
            (Self::Supply, RequestKind::Supply) | (Self::Investment, RequestKind::Investment)
        )
    }
}

impl fmt::Display for OfferType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Supply => write!(f, "supply"),
            Self::Investment => write!(f, "investment"),
        }
    }
}

/// Lifecycle status of an offer.
///
/// `Pending → Accepted` and `Pending → Rejected` are the only moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferStatus {
    Pending,
    Accepted,
    Rejected,
}

impl OfferStatus {
    #[must_use]
    pub fn can_transition_to(self, target: Self) -> bool {
        matches!((self, target), (Self::Pending, Self::Accepted | Self::Rejected))
    }
}

impl fmt::Display for OfferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Accepted => write!(f, "accepted"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

/// The commercial terms an offeror proposes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferTerms {
    pub offer_type: OfferType,
    /// Price of the supply or amount of the investment. Becomes the
    /// deal's gross amount on acceptance.
    pub amount: Decimal,
    /// Equity asked in exchange for an investment, in percent.
    pub equity_percentage: Option<Decimal>,
    pub duration_in_days: Option<u32>,
    pub message: Option<String>,
}

impl OfferTerms {
    #[must_use]
    pub fn supply(price: Decimal) -> Self {
        Self {
            offer_type: OfferType::Supply,
            amount: price,
            equity_percentage: None,
            duration_in_days: None,
            message: None,
        }
    }

    #[must_use]
    pub fn investment(amount: Decimal, equity_percentage: Decimal) -> Self {
        Self {
            offer_type: OfferType::Investment,
            amount,
            equity_percentage: Some(equity_percentage),
            duration_in_days: None,
            message: None,
        }
    }

    #[must_use]
    pub fn with_duration(mut self, days: u32) -> Self {
        self.duration_in_days = Some(days);
        self
    }

    /// Validate the terms against the kind of request they answer.
    ///
    /// # Errors
    /// Returns `InvalidOffer` describing the first failed check.
    pub fn validate_for(&self, kind: RequestKind) -> Result<()> {
        if !self.offer_type.answers(kind) {
            return Err(invalid(format!(
                "{} offer cannot answer a {kind} request",
                self.offer_type
            )));
        }
        crate::deal::check_amount(self.amount).map_err(invalid)?;
        match (self.offer_type, self.equity_percentage) {
            (OfferType::Supply, Some(_)) => {
                return Err(invalid("supply offers carry no equity".to_string()));
            }
            (OfferType::Investment, Some(pct))
                if pct <= Decimal::ZERO || pct > Decimal::ONE_HUNDRED =>
            {
                return Err(invalid(format!("equity {pct}% outside (0, 100]")));
            }
            _ => {}
        }
        if self.duration_in_days == Some(0) {
            return Err(invalid("duration must be at least one day".to_string()));
        }
        Ok(())
    }
}

fn invalid(reason: String) -> DealbookError {
    DealbookError::InvalidOffer { reason }
}

/// A counterparty's proposed terms against a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    pub id: OfferId,
    pub request_id: RequestId,
    pub offered_by_id: UserId,
    pub terms: OfferTerms,
    pub status: OfferStatus,
    /// Why the offer was rejected, when it was.
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Offer {
    #[must_use]
    pub fn new(request_id: RequestId, offered_by_id: UserId, terms: OfferTerms) -> Self {
        let now = Utc::now();
        Self {
            id: OfferId::new(),
            request_id,
            offered_by_id,
            terms,
            status: OfferStatus::Pending,
            rejection_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == OfferStatus::Pending
    }

    /// Guard used by every offer transition.
    ///
    /// # Errors
    /// Returns `OfferNotPending` if the offer already left `pending`.
    pub fn ensure_pending(&self) -> Result<()> {
        if self.is_pending() {
            Ok(())
        } else {
            Err(DealbookError::OfferNotPending {
                id: self.id,
                status: self.status,
            })
        }
    }

    /// `pending → accepted`.
    ///
    /// # Errors
    /// Returns `OfferNotPending` if the offer is not pending.
    pub fn mark_accepted(&mut self) -> Result<()> {
        self.ensure_pending()?;
        self.status = OfferStatus::Accepted;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// `pending → rejected`, recording why.
    ///
    /// # Errors
    /// Returns `OfferNotPending` if the offer is not pending.
    pub fn mark_rejected(&mut self, reason: &str) -> Result<()> {
        self.ensure_pending()?;
        self.status = OfferStatus::Rejected;
        self.rejection_reason = Some(reason.to_string());
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Test helpers.
#[cfg(any(test, feature = "test-helpers"))]
impl Offer {
    /// A pending investment offer for `amount` at 10% equity.
    pub fn dummy_investment(request_id: RequestId, amount: Decimal) -> Self {
        Self::new(
            request_id,
            UserId::new(),
            OfferTerms::investment(amount, Decimal::TEN),
        )
    }
}
