//! Ledger invariant checker.
//!
//! Relations enforced on the post-state of every commit and by a full
//! [`audit`](crate::InMemoryLedger::audit):
//! ```text
//! ∀ request: |{offer ∈ offers(request) : offer.status = accepted}| ≤ 1
//! ∀ accepted offer: exactly one deal, and request.accepted_offer_id = offer
//! ∀ deal:    commission + net = gross,  0 ≤ balance ≤ net
//! ∀ deal:    Σ(amount of withdrawals holding funds) + balance = net
//! ∀ target:  |{dispute : dispute.status = open}| ≤ 1
//! ```
//! If any relation breaks, the commit is refused and nothing is applied.

use dealbook_types::{
    Deal, DealId, DealbookError, Dispute, Offer, OfferId, OfferStatus, Request, RequestId,
    Result, Withdrawal, WithdrawalId, WithdrawalStatus,
};
use rust_decimal::Decimal;

/// Read access to a ledger state, committed or staged.
pub trait LedgerView {
    fn request(&self, id: RequestId) -> Option<&Request>;
    fn offer(&self, id: OfferId) -> Option<&Offer>;
    fn offers_of(&self, id: RequestId) -> Vec<&Offer>;
    fn deal(&self, id: DealId) -> Option<&Deal>;
    fn deal_for_offer(&self, id: OfferId) -> Option<&Deal>;
    fn withdrawal(&self, id: WithdrawalId) -> Option<&Withdrawal>;
    fn withdrawals_of(&self, id: DealId) -> Vec<&Withdrawal>;
    fn disputes_of(&self, id: WithdrawalId) -> Vec<&Dispute>;
}

fn violation(reason: String) -> DealbookError {
    DealbookError::InvariantViolation { reason }
}

/// At most one accepted offer, consistent with the request pointer, and
/// backed by a deal.
pub fn check_request(view: &impl LedgerView, id: RequestId) -> Result<()> {
    let request = view
        .request(id)
        .ok_or_else(|| violation(format!("{id} referenced but not stored")))?;

    let accepted: Vec<&Offer> = view
        .offers_of(id)
        .into_iter()
        .filter(|o| o.status == OfferStatus::Accepted)
        .collect();

    if accepted.len() > 1 {
        return Err(violation(format!(
            "{id} has {} accepted offers",
            accepted.len()
        )));
    }

    let accepted_id = accepted.first().map(|o| o.id);
    if request.accepted_offer_id != accepted_id {
        return Err(violation(format!(
            "{id} points at accepted offer {:?} but ledger holds {:?}",
            request.accepted_offer_id, accepted_id
        )));
    }

    if let Some(offer_id) = accepted_id {
        if request.status.accepts_offers() {
            return Err(violation(format!(
                "{id} has accepted {offer_id} but is still {}",
                request.status
            )));
        }
        if view.deal_for_offer(offer_id).is_none() {
            return Err(violation(format!("accepted {offer_id} has no deal")));
        }
    }
    Ok(())
}

/// Formation arithmetic, balance bounds, and balance conservation against
/// the deal's withdrawals.
pub fn check_deal(view: &impl LedgerView, id: DealId) -> Result<()> {
    let deal = view
        .deal(id)
        .ok_or_else(|| violation(format!("{id} referenced but not stored")))?;

    deal.check_figures()?;

    match view.offer(deal.offer_id) {
        Some(offer) if offer.status == OfferStatus::Accepted => {}
        Some(offer) => {
            return Err(violation(format!(
                "{id} formed from {} which is {}",
                offer.id, offer.status
            )));
        }
        None => return Err(violation(format!("{id} formed from unknown {}", deal.offer_id))),
    }

    let withdrawn: Decimal = view
        .withdrawals_of(id)
        .into_iter()
        .filter(|w| w.status.holds_funds())
        .map(|w| w.amount)
        .sum();

    if withdrawn + deal.balance != deal.net_amount {
        return Err(violation(format!(
            "{id}: withdrawn {withdrawn} + balance {} != net {}",
            deal.balance, deal.net_amount
        )));
    }
    Ok(())
}

/// One open dispute per withdrawal, and a disputed withdrawal has one.
pub fn check_disputes(view: &impl LedgerView, id: WithdrawalId) -> Result<()> {
    let open = view
        .disputes_of(id)
        .into_iter()
        .filter(|d| d.is_open())
        .count();
    if open > 1 {
        return Err(violation(format!("{id} has {open} open disputes")));
    }
    if let Some(w) = view.withdrawal(id) {
        let disputed = w.status == WithdrawalStatus::Disputed;
        if disputed != (open == 1) {
            return Err(violation(format!(
                "{id} is {} with {open} open disputes",
                w.status
            )));
        }
    }
    Ok(())
}
