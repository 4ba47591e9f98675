//! Deal Formation and deal status upkeep.
//!
//! Formation is internal: only offer acceptance calls it, inside the
//! acceptance commit. Afterwards a deal's status follows its withdrawals:
//!
//! ```text
//!   active ──(any withdrawal disputed)──▶ disputed ──(none left)──▶ active
//!   active ──(balance 0, every withdrawal resolved/rejected)──▶ completed
//! ```

use chrono::Utc;
use dealbook_ledger::{Versioned, Write, WriteSet};
use dealbook_types::{
    CommissionPolicy, Deal, DealStatus, DealbookError, MarketEvent, Offer, OfferStatus, Request,
    RequestStatus, Result, Settlement, UserId, Withdrawal, WithdrawalStatus,
};
use rust_decimal::Decimal;
use tracing::debug;

use crate::marketplace::Marketplace;

/// Refuse a gross amount the commission would consume entirely: such a
/// deal has nothing to withdraw and could never complete.
///
/// # Errors
/// Returns `InvalidOffer` when the net amount rounds to zero.
pub fn ensure_positive_net(gross: Decimal, policy: &CommissionPolicy) -> Result<()> {
    let settlement = Settlement::compute(gross, policy.rate);
    if settlement.net_amount > Decimal::ZERO {
        Ok(())
    } else {
        Err(DealbookError::InvalidOffer {
            reason: format!(
                "amount {gross} leaves no net after {} commission of {}",
                policy.rate, settlement.commission_amount
            ),
        })
    }
}

/// Materialize the deal for `offer`, just accepted against `request`.
///
/// # Errors
/// Returns `Internal` if the offer is not accepted or belongs elsewhere,
/// and `InvalidOffer` if its net amount would be zero.
pub fn form_deal(request: &Request, offer: &Offer, policy: &CommissionPolicy) -> Result<Deal> {
    if offer.status != OfferStatus::Accepted || offer.request_id != request.id {
        return Err(DealbookError::Internal(format!(
            "deal formation from {} ({}) for {}",
            offer.id, offer.status, request.id
        )));
    }
    ensure_positive_net(offer.terms.amount, policy)?;
    let deal = Deal::form(
        request.id,
        offer.id,
        request.owner_id,
        offer.offered_by_id,
        offer.terms.amount,
        policy,
    );
    debug!(
        deal_id = %deal.id,
        gross = %deal.gross_amount,
        commission = %deal.commission_amount,
        net = %deal.net_amount,
        rate = %deal.commission_rate,
        policy_version = deal.commission_policy_version,
        "Deal formed"
    );
    Ok(deal)
}

/// The status `deal` should hold given its post-commit `withdrawals`.
///
/// `completed` is final.
#[must_use]
pub fn derive_status(deal: &Deal, withdrawals: &[Withdrawal]) -> DealStatus {
    if deal.status == DealStatus::Completed {
        return DealStatus::Completed;
    }
    if withdrawals.iter().any(|w| w.status == WithdrawalStatus::Disputed) {
        DealStatus::Disputed
    } else if deal.balance.is_zero() && withdrawals.iter().all(|w| w.status.is_terminal()) {
        DealStatus::Completed
    } else {
        DealStatus::Active
    }
}

/// `withdrawals` with `updated` substituted for its stored version.
pub(crate) fn replace_withdrawal(mut withdrawals: Vec<Withdrawal>, updated: &Withdrawal) -> Vec<Withdrawal> {
    match withdrawals.iter_mut().find(|w| w.id == updated.id) {
        Some(slot) => *slot = updated.clone(),
        None => withdrawals.push(updated.clone()),
    }
    withdrawals
}

impl Marketplace {
    /// Stage `updated` over `current` with its status re-derived from
    /// `withdrawals`, and carry a completion through to the request.
    ///
    /// The deal row is always rewritten so that every status-affecting
    /// withdrawal transition on one deal serializes on its version.
    pub(crate) fn stage_deal(
        &self,
        set: &mut WriteSet,
        current: &Versioned<Deal>,
        mut updated: Deal,
        withdrawals: &[Withdrawal],
        actor: UserId,
    ) -> Result<Deal> {
        let status = derive_status(&updated, withdrawals);
        let completed = status == DealStatus::Completed && updated.status != DealStatus::Completed;
        if status != updated.status {
            updated.status = status;
            updated.updated_at = Utc::now();
        }
        set.push_write(Write::UpdateDeal {
            expected: current.version,
            row: updated.clone(),
        });

        if completed {
            set.push_event(MarketEvent::DealCompleted { deal_id: updated.id });
            let request = self.load_request(updated.request_id)?;
            if request.row.status == RequestStatus::InProgress {
                let mut row = request.row.clone();
                row.transition_to(RequestStatus::Completed)?;
                set.push_write(Write::UpdateRequest {
                    expected: request.version,
                    row,
                });
                set.push_event(MarketEvent::RequestStatusChanged {
                    request_id: updated.request_id,
                    from: RequestStatus::InProgress,
                    to: RequestStatus::Completed,
                    actor,
                });
            }
            debug!(deal_id = %updated.id, request_id = %updated.request_id, "Deal completion staged");
        }
        Ok(updated)
    }
}
