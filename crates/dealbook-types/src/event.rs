//! Domain events emitted by committed transitions.
//!
//! Every commit carries the events it produced. The ledger appends them
//! to its hash-chained journal; the engine forwards them to the
//! notification sink after the commit lands.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    DealId, DisputeId, DisputeOutcome, EntityRef, OfferId, RequestId, RequestStatus, UserId,
    WithdrawalId,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MarketEvent {
    RequestCreated {
        request_id: RequestId,
        owner_id: UserId,
    },
    RequestStatusChanged {
        request_id: RequestId,
        from: RequestStatus,
        to: RequestStatus,
        actor: UserId,
    },
    OfferSubmitted {
        offer_id: OfferId,
        request_id: RequestId,
        offered_by_id: UserId,
        amount: Decimal,
    },
    OfferAccepted {
        offer_id: OfferId,
        request_id: RequestId,
        deal_id: DealId,
    },
    OfferRejected {
        offer_id: OfferId,
        request_id: RequestId,
        reason: String,
    },
    DealFormed {
        deal_id: DealId,
        gross_amount: Decimal,
        commission_amount: Decimal,
        net_amount: Decimal,
    },
    DealCompleted {
        deal_id: DealId,
    },
    WithdrawalRequested {
        withdrawal_id: WithdrawalId,
        deal_id: DealId,
        amount: Decimal,
    },
    WithdrawalApproved {
        withdrawal_id: WithdrawalId,
        deal_id: DealId,
        amount: Decimal,
        balance_after: Decimal,
    },
    WithdrawalRejected {
        withdrawal_id: WithdrawalId,
        deal_id: DealId,
    },
    ProofSubmitted {
        withdrawal_id: WithdrawalId,
        proof_url: String,
    },
    WithdrawalResolved {
        withdrawal_id: WithdrawalId,
        deal_id: DealId,
    },
    DisputeOpened {
        dispute_id: DisputeId,
        withdrawal_id: WithdrawalId,
        opened_by_id: UserId,
    },
    DisputeResolved {
        dispute_id: DisputeId,
        withdrawal_id: WithdrawalId,
        outcome: DisputeOutcome,
        balance_after: Decimal,
    },
    DisputeDismissed {
        dispute_id: DisputeId,
        withdrawal_id: WithdrawalId,
    },
}

impl MarketEvent {
    /// Stable event name, matching the serialized `event` tag.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RequestCreated { .. } => "request_created",
            Self::RequestStatusChanged { .. } => "request_status_changed",
            Self::OfferSubmitted { .. } => "offer_submitted",
            Self::OfferAccepted { .. } => "offer_accepted",
            Self::OfferRejected { .. } => "offer_rejected",
            Self::DealFormed { .. } => "deal_formed",
            Self::DealCompleted { .. } => "deal_completed",
            Self::WithdrawalRequested { .. } => "withdrawal_requested",
            Self::WithdrawalApproved { .. } => "withdrawal_approved",
            Self::WithdrawalRejected { .. } => "withdrawal_rejected",
            Self::ProofSubmitted { .. } => "proof_submitted",
            Self::WithdrawalResolved { .. } => "withdrawal_resolved",
            Self::DisputeOpened { .. } => "dispute_opened",
            Self::DisputeResolved { .. } => "dispute_resolved",
            Self::DisputeDismissed { .. } => "dispute_dismissed",
        }
    }

    /// The primary entity the event is about.
    #[must_use]
    pub fn subject(&self) -> EntityRef {
        match self {
            Self::RequestCreated { request_id, .. }
            | Self::RequestStatusChanged { request_id, .. } => EntityRef::Request(*request_id),
            Self::OfferSubmitted { offer_id, .. }
            | Self::OfferAccepted { offer_id, .. }
            | Self::OfferRejected { offer_id, .. } => EntityRef::Offer(*offer_id),
            Self::DealFormed { deal_id, .. } | Self::DealCompleted { deal_id } => {
                EntityRef::Deal(*deal_id)
            }
            Self::WithdrawalRequested { withdrawal_id, .. }
            | Self::WithdrawalApproved { withdrawal_id, .. }
            | Self::WithdrawalRejected { withdrawal_id, .. }
            | Self::ProofSubmitted { withdrawal_id, .. }
            | Self::WithdrawalResolved { withdrawal_id, .. } => {
                EntityRef::Withdrawal(*withdrawal_id)
            }
            Self::DisputeOpened { dispute_id, .. }
            | Self::DisputeResolved { dispute_id, .. }
            | Self::DisputeDismissed { dispute_id, .. } => EntityRef::Dispute(*dispute_id),
        }
    }
}

impl fmt::Display for MarketEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind(), self.subject())
    }
}
