//! End-to-end scenarios through the `Marketplace` facade.
//!
//! Each test drives the public contracts only, then checks the resulting
//! rows, the emitted events, and the ledger's own audit.

mod common;

use std::sync::Arc;

use common::{Fixture, dec};
use dealbook_engine::{AllowAll, Marketplace, MemoryAttachmentStore, NullSink};
use dealbook_ledger::InMemoryLedger;
use dealbook_types::offer::{REJECTED_BY_OWNER, REQUEST_CLOSED, SUPERSEDED, WITHDRAWN_BY_OFFEROR};
use dealbook_types::*;
use rust_decimal::Decimal;

// ---------------------------------------------------------------------------
// Offers
// ---------------------------------------------------------------------------

#[test]
fn accepting_one_offer_rejects_the_other() {
    let fx = Fixture::new();
    let request = fx.investment_request();
    let (_, a) = fx.offer(&request, dec(1000));
    let (_, b) = fx.offer(&request, dec(1200));

    let deal = fx.market.accept_offer(a.id, fx.owner).unwrap();

    assert_eq!(fx.market.offer(a.id).unwrap().status, OfferStatus::Accepted);
    let b = fx.market.offer(b.id).unwrap();
    assert_eq!(b.status, OfferStatus::Rejected);
    assert_eq!(b.rejection_reason.as_deref(), Some(SUPERSEDED));

    let request = fx.market.request(request.id).unwrap();
    assert_eq!(request.status, RequestStatus::InProgress);
    assert_eq!(request.accepted_offer_id, Some(a.id));

    assert_eq!(deal.offer_id, a.id);
    assert_eq!(fx.market.deal_for_offer(a.id).unwrap(), Some(deal.clone()));
    assert_eq!(fx.market.deal_for_offer(b.id).unwrap(), None);

    let kinds = fx.sink.kinds();
    for expected in ["offer_accepted", "deal_formed", "offer_rejected", "request_status_changed"] {
        assert!(kinds.contains(&expected), "missing {expected} in {kinds:?}");
    }
    fx.assert_consistent();
}

#[test]
fn deal_figures_follow_commission_policy() {
    let fx = Fixture::new();
    let (_, deal) = fx.deal();
    assert_eq!(deal.gross_amount, dec(1000));
    assert_eq!(deal.commission_amount, dec(20));
    assert_eq!(deal.net_amount, dec(980));
    assert_eq!(deal.balance, dec(980));
    assert_eq!(deal.commission_rate, Decimal::new(2, 2));
    assert_eq!(deal.commission_policy_version, 1);
    assert_eq!(deal.status, DealStatus::Active);
    assert_eq!(deal.parties[0], fx.owner);
}

#[test]
fn commission_rounds_to_cents() {
    let fx = Fixture::new();
    let request = fx.investment_request();
    // 1234.55 * 0.02 = 24.691
    let (_, offer) = fx.offer(&request, Decimal::new(123_455, 2));
    let deal = fx.market.accept_offer(offer.id, fx.owner).unwrap();
    assert_eq!(deal.commission_amount, Decimal::new(2469, 2));
    assert_eq!(deal.net_amount, Decimal::new(120_986, 2));
    assert_eq!(deal.commission_amount + deal.net_amount, deal.gross_amount);
}

#[test]
fn trailing_zeros_are_accepted_on_amounts() {
    let fx = Fixture::new();
    let request = fx.investment_request();
    let (_, offer) = fx.offer(&request, Decimal::new(1_000_000, 3));
    assert_eq!(offer.terms.amount, dec(1000));

    let deal = fx.market.accept_offer(offer.id, fx.owner).unwrap();
    assert_eq!(deal.net_amount, dec(980));

    let w = fx
        .market
        .request_withdrawal(deal.id, fx.owner, Decimal::new(5000, 3), "courier")
        .unwrap();
    fx.market.approve_withdrawal(w.id, fx.admin).unwrap();
    assert_eq!(fx.balance(&deal), dec(975));
    fx.assert_consistent();
}

#[test]
fn offer_the_commission_would_consume_is_refused() {
    let mut config = MarketplaceConfig::default();
    config.commission = CommissionPolicy::new(Decimal::new(5, 1), 2);
    let fx = Fixture::with_config(config);
    let request = fx.investment_request();
    let investor = fx.user(Role::Investor);

    let err = fx
        .market
        .submit_offer(request.id, investor, OfferTerms::investment(Decimal::new(1, 2), Decimal::ONE))
        .unwrap_err();
    assert!(matches!(err, DealbookError::InvalidOffer { .. }), "Got: {err}");
    assert!(fx.market.offers_for_request(request.id).unwrap().is_empty());

    let (_, offer) = fx.offer(&request, Decimal::new(3, 2));
    let deal = fx.market.accept_offer(offer.id, fx.owner).unwrap();
    assert_eq!(deal.net_amount, Decimal::new(1, 2));
    fx.assert_consistent();
}

#[test]
fn rejecting_the_last_offer_leaves_request_open() {
    let fx = Fixture::new();
    let request = fx.investment_request();
    let (_, offer) = fx.offer(&request, dec(1000));

    let rejected = fx.market.reject_offer(offer.id, fx.owner).unwrap();
    assert_eq!(rejected.status, OfferStatus::Rejected);
    assert_eq!(rejected.rejection_reason.as_deref(), Some(REJECTED_BY_OWNER));
    assert_eq!(fx.market.request(request.id).unwrap().status, RequestStatus::Open);

    let err = fx.market.reject_offer(offer.id, fx.owner).unwrap_err();
    assert!(matches!(err, DealbookError::OfferNotPending { .. }));
    let err = fx.market.accept_offer(offer.id, fx.owner).unwrap_err();
    assert!(matches!(err, DealbookError::OfferNotPending { .. }));
}

#[test]
fn offeror_can_withdraw_own_offer_only() {
    let fx = Fixture::new();
    let request = fx.investment_request();
    let (investor, offer) = fx.offer(&request, dec(1000));
    let stranger = fx.user(Role::Investor);

    let err = fx.market.withdraw_offer(offer.id, stranger).unwrap_err();
    assert!(matches!(err, DealbookError::NotAuthorized { .. }));

    let withdrawn = fx.market.withdraw_offer(offer.id, investor).unwrap();
    assert_eq!(withdrawn.rejection_reason.as_deref(), Some(WITHDRAWN_BY_OFFEROR));
}

#[test]
fn only_the_owner_accepts() {
    let fx = Fixture::new();
    let request = fx.investment_request();
    let (investor, offer) = fx.offer(&request, dec(1000));
    let other_owner = fx.user(Role::Entrepreneur);

    for actor in [investor, other_owner] {
        let err = fx.market.accept_offer(offer.id, actor).unwrap_err();
        assert!(matches!(err, DealbookError::NotAuthorized { .. }), "Got: {err}");
    }
    assert!(fx.market.offer(offer.id).unwrap().is_pending());
}

#[test]
fn offer_preconditions() {
    let fx = Fixture::new();
    let request = fx.investment_request();

    // Owner offering on their own request.
    fx.policy.grant(Role::Entrepreneur, Action::SubmitOffer);
    let err = fx
        .market
        .submit_offer(request.id, fx.owner, OfferTerms::investment(dec(10), Decimal::TEN))
        .unwrap_err();
    assert!(matches!(err, DealbookError::InvalidOffer { .. }));

    // Supply terms on an investment request.
    let investor = fx.user(Role::Investor);
    let err = fx
        .market
        .submit_offer(request.id, investor, OfferTerms::supply(dec(10)))
        .unwrap_err();
    assert!(matches!(err, DealbookError::InvalidOffer { .. }));

    // Unknown request.
    let err = fx
        .market
        .submit_offer(RequestId::new(), investor, OfferTerms::investment(dec(10), Decimal::TEN))
        .unwrap_err();
    assert!(matches!(err, DealbookError::RequestNotFound(_)));

    // Request already in progress.
    let (_, offer) = fx.offer(&request, dec(1000));
    fx.market.accept_offer(offer.id, fx.owner).unwrap();
    let err = fx
        .market
        .submit_offer(request.id, investor, OfferTerms::investment(dec(10), Decimal::TEN))
        .unwrap_err();
    assert!(matches!(
        err,
        DealbookError::RequestNotOpen {
            status: RequestStatus::InProgress,
            ..
        }
    ));
}

#[test]
fn second_acceptance_reports_request_resolved() {
    let fx = Fixture::new();
    let request = fx.investment_request();
    let (_, a) = fx.offer(&request, dec(1000));
    let (_, b) = fx.offer(&request, dec(1200));
    fx.market.accept_offer(a.id, fx.owner).unwrap();

    let err = fx.market.accept_offer(b.id, fx.owner).unwrap_err();
    assert!(matches!(err, DealbookError::RequestAlreadyResolved(_)));
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[test]
fn closing_a_request_rejects_pending_offers() {
    let fx = Fixture::new();
    let request = fx.investment_request();
    let (_, a) = fx.offer(&request, dec(1000));
    let (_, b) = fx.offer(&request, dec(1100));

    let closed = fx.market.close_request(request.id, fx.owner).unwrap();
    assert_eq!(closed.status, RequestStatus::Closed);
    for id in [a.id, b.id] {
        let offer = fx.market.offer(id).unwrap();
        assert_eq!(offer.status, OfferStatus::Rejected);
        assert_eq!(offer.rejection_reason.as_deref(), Some(REQUEST_CLOSED));
    }

    let err = fx.market.accept_offer(a.id, fx.owner).unwrap_err();
    assert!(matches!(err, DealbookError::RequestNotOpen { .. }));
    let err = fx.market.close_request(request.id, fx.owner).unwrap_err();
    assert!(matches!(err, DealbookError::RequestNotOpen { .. }));
    fx.assert_consistent();
}

#[test]
fn stranger_cannot_close_a_request() {
    let fx = Fixture::new();
    let request = fx.investment_request();
    let other = fx.user(Role::Entrepreneur);
    let err = fx.market.close_request(request.id, other).unwrap_err();
    assert!(matches!(err, DealbookError::NotAuthorized { .. }));

    // An admin may close on the owner's behalf.
    fx.market.close_request(request.id, fx.admin).unwrap();
}

#[test]
fn admin_status_override_follows_state_machine() {
    let fx = Fixture::new();
    let request = fx.investment_request();

    let r = fx
        .market
        .set_request_status(request.id, fx.admin, RequestStatus::UnderReview)
        .unwrap();
    assert_eq!(r.status, RequestStatus::UnderReview);

    // Offers are still accepted under review.
    let (_, offer) = fx.offer(&request, dec(1000));

    let err = fx
        .market
        .set_request_status(request.id, fx.admin, RequestStatus::InProgress)
        .unwrap_err();
    assert!(matches!(err, DealbookError::InvalidRequestTransition { .. }));

    let err = fx
        .market
        .set_request_status(request.id, fx.owner, RequestStatus::Open)
        .unwrap_err();
    assert!(matches!(err, DealbookError::NotAuthorized { .. }));

    fx.market.accept_offer(offer.id, fx.owner).unwrap();
    let err = fx
        .market
        .set_request_status(request.id, fx.admin, RequestStatus::Open)
        .unwrap_err();
    assert!(matches!(
        err,
        DealbookError::InvalidRequestTransition {
            from: RequestStatus::InProgress,
            to: RequestStatus::Open
        }
    ));
}

#[test]
fn request_validation() {
    let fx = Fixture::new();
    let err = fx
        .market
        .create_request(fx.owner, BusinessId::new(), RequestKind::Supply, None, "Steel")
        .unwrap_err();
    assert!(matches!(err, DealbookError::InvalidRequest { .. }));

    let err = fx
        .market
        .create_request(fx.owner, BusinessId::new(), RequestKind::Investment, None, "  ")
        .unwrap_err();
    assert!(matches!(err, DealbookError::InvalidRequest { .. }));

    let investor = fx.user(Role::Investor);
    let err = fx
        .market
        .create_request(investor, BusinessId::new(), RequestKind::Investment, None, "Round")
        .unwrap_err();
    assert!(matches!(err, DealbookError::NotAuthorized { .. }));
}

// ---------------------------------------------------------------------------
// Withdrawals
// ---------------------------------------------------------------------------

#[test]
fn full_withdrawal_exhausts_the_deal() {
    let fx = Fixture::new();
    let (_, deal) = fx.deal();

    let w = fx.approved_withdrawal(&deal, dec(980));
    assert_eq!(w.status, WithdrawalStatus::Approved);
    assert_eq!(w.approved_by, Some(fx.admin));
    assert!(w.approved_at.is_some());
    assert_eq!(fx.balance(&deal), Decimal::ZERO);

    let err = fx
        .market
        .request_withdrawal(deal.id, fx.owner, Decimal::new(1, 2), "more")
        .unwrap_err();
    assert!(matches!(err, DealbookError::InsufficientBalance { .. }));
    fx.assert_consistent();
}

#[test]
fn balance_is_rechecked_at_approval() {
    let fx = Fixture::new();
    let (_, deal) = fx.deal();
    let first = fx
        .market
        .request_withdrawal(deal.id, fx.owner, dec(600), "batch one")
        .unwrap();
    let second = fx
        .market
        .request_withdrawal(deal.id, fx.owner, dec(600), "batch two")
        .unwrap();
    assert_eq!(fx.balance(&deal), dec(980), "requests do not reserve");

    fx.market.approve_withdrawal(first.id, fx.admin).unwrap();
    let err = fx.market.approve_withdrawal(second.id, fx.admin).unwrap_err();
    assert!(matches!(
        err,
        DealbookError::InsufficientBalance { needed, available }
            if needed == dec(600) && available == dec(380)
    ));
    assert_eq!(
        fx.market.withdrawal(second.id).unwrap().status,
        WithdrawalStatus::Requested
    );

    let declined = fx
        .market
        .reject_withdrawal(second.id, fx.admin, Some("exceeds balance"))
        .unwrap();
    assert_eq!(declined.status, WithdrawalStatus::Rejected);
    assert_eq!(declined.decision_note.as_deref(), Some("exceeds balance"));
    assert_eq!(fx.balance(&deal), dec(380));
    fx.assert_consistent();
}

#[test]
fn approving_twice_debits_once() {
    let fx = Fixture::new();
    let (_, deal) = fx.deal();
    let w = fx.approved_withdrawal(&deal, dec(500));
    let journal = fx.ledger.journal_len();

    let again = fx.market.approve_withdrawal(w.id, fx.admin).unwrap();
    assert_eq!(again, w);
    assert_eq!(fx.balance(&deal), dec(480));
    assert_eq!(fx.ledger.journal_len(), journal);

    let err = fx.market.reject_withdrawal(w.id, fx.admin, None).unwrap_err();
    assert!(matches!(err, DealbookError::WithdrawalNotRequested { .. }));
}

#[test]
fn withdrawal_preconditions() {
    let fx = Fixture::new();
    let (investor, deal) = fx.deal();
    let outsider = fx.user(Role::Investor);

    let err = fx
        .market
        .request_withdrawal(deal.id, outsider, dec(10), "mine")
        .unwrap_err();
    assert!(matches!(err, DealbookError::NotAuthorized { .. }));

    for (amount, reason) in [
        (Decimal::ZERO, "zero"),
        (dec(-5), "negative"),
        (Decimal::new(1001, 3), "sub-cent"),
        (dec(5), ""),
    ] {
        let err = fx
            .market
            .request_withdrawal(deal.id, investor, amount, reason)
            .unwrap_err();
        assert!(matches!(err, DealbookError::InvalidWithdrawal { .. }), "{amount} {reason:?}: {err}");
    }

    let err = fx
        .market
        .request_withdrawal(deal.id, investor, dec(981), "too much")
        .unwrap_err();
    assert!(matches!(err, DealbookError::InsufficientBalance { .. }));

    // Parties on both sides may withdraw.
    fx.market
        .request_withdrawal(deal.id, investor, dec(10), "expenses")
        .unwrap();

    // Only the approval authority approves.
    let w = fx
        .market
        .request_withdrawal(deal.id, fx.owner, dec(10), "fees")
        .unwrap();
    let err = fx.market.approve_withdrawal(w.id, fx.owner).unwrap_err();
    assert!(matches!(
        err,
        DealbookError::NotAuthorized {
            action: Action::ApproveWithdrawal,
            ..
        }
    ));
}

#[test]
fn proof_then_release_completes_the_deal() {
    let fx = Fixture::new();
    let (investor, deal) = fx.deal();
    let w = fx.approved_withdrawal(&deal, dec(980));
    let url = "https://files.example/receipts/42.pdf";

    let err = fx.market.submit_proof(w.id, investor, url).unwrap_err();
    assert!(matches!(err, DealbookError::NotAuthorized { .. }));

    let err = fx.market.confirm_release(w.id, fx.admin).unwrap_err();
    assert!(matches!(err, DealbookError::ProofNotSubmitted { .. }));

    let proved = fx.market.submit_proof(w.id, fx.owner, url).unwrap();
    assert_eq!(proved.status, WithdrawalStatus::ProofSubmitted);
    assert_eq!(proved.proof_url.as_deref(), Some(url));
    assert_eq!(fx.market.submit_proof(w.id, fx.owner, url).unwrap(), proved);

    let released = fx.market.confirm_release(w.id, fx.admin).unwrap();
    assert_eq!(released.status, WithdrawalStatus::Resolved);
    assert_eq!(fx.market.confirm_release(w.id, fx.admin).unwrap(), released);

    assert_eq!(fx.market.deal(deal.id).unwrap().status, DealStatus::Completed);
    assert_eq!(
        fx.market.request(deal.request_id).unwrap().status,
        RequestStatus::Completed
    );
    assert!(fx.sink.kinds().contains(&"deal_completed"));

    let err = fx
        .market
        .request_withdrawal(deal.id, fx.owner, dec(1), "late")
        .unwrap_err();
    assert!(matches!(err, DealbookError::InsufficientBalance { .. } | DealbookError::DealNotActive { .. }));
    fx.assert_consistent();
}

#[test]
fn proof_must_resolve_in_attachment_store() {
    let ledger = Arc::new(InMemoryLedger::new());
    let attachments = Arc::new(MemoryAttachmentStore::new());
    let market = Marketplace::new(ledger.clone(), Arc::new(AllowAll), MarketplaceConfig::default())
        .unwrap()
        .with_sink(Arc::new(NullSink))
        .with_attachments(attachments.clone());

    let owner = UserId::new();
    let investor = UserId::new();
    let admin = UserId::new();
    let request = market
        .create_request(owner, BusinessId::new(), RequestKind::Investment, None, "Round")
        .unwrap();
    let offer = market
        .submit_offer(request.id, investor, OfferTerms::investment(dec(100), Decimal::ONE))
        .unwrap();
    let deal = market.accept_offer(offer.id, owner).unwrap();
    let w = market
        .request_withdrawal(deal.id, owner, dec(50), "rent")
        .unwrap();
    market.approve_withdrawal(w.id, admin).unwrap();

    let url = "vault://proofs/rent-march";
    let err = market.submit_proof(w.id, owner, url).unwrap_err();
    assert!(matches!(err, DealbookError::ProofNotResolvable { .. }));

    attachments.put(url, Some("application/pdf"));
    let proved = market.submit_proof(w.id, owner, url).unwrap();
    assert_eq!(proved.proof_url.as_deref(), Some(url));
    ledger.audit().unwrap();
}

#[test]
fn storage_outage_propagates() {
    let fx = Fixture::new();
    let (_, deal) = fx.deal();
    fx.ledger.set_available(false);

    let err = fx
        .market
        .request_withdrawal(deal.id, fx.owner, dec(10), "rent")
        .unwrap_err();
    assert!(matches!(err, DealbookError::StorageUnavailable(_)));
    assert!(!err.is_retryable());

    fx.ledger.set_available(true);
    fx.market
        .request_withdrawal(deal.id, fx.owner, dec(10), "rent")
        .unwrap();
}

// ---------------------------------------------------------------------------
// Disputes
// ---------------------------------------------------------------------------

#[test]
fn upheld_dispute_restores_balance() {
    let fx = Fixture::new();
    let (investor, deal) = fx.deal();
    let w = fx.approved_withdrawal(&deal, dec(500));
    assert_eq!(fx.balance(&deal), dec(480));

    let dispute = fx
        .market
        .open_dispute(DisputeTarget::Withdrawal(w.id), investor, "goods never arrived")
        .unwrap();
    assert_eq!(dispute.status, DisputeStatus::Open);
    assert_eq!(dispute.target_prior_status, WithdrawalStatus::Approved);
    assert_eq!(fx.market.withdrawal(w.id).unwrap().status, WithdrawalStatus::Disputed);
    assert_eq!(fx.market.deal(deal.id).unwrap().status, DealStatus::Disputed);

    // A disputed deal takes no new withdrawals.
    let err = fx
        .market
        .request_withdrawal(deal.id, fx.owner, dec(10), "rent")
        .unwrap_err();
    assert!(matches!(err, DealbookError::DealNotActive { .. }));

    let resolved = fx
        .market
        .resolve_dispute(dispute.id, fx.admin, DisputeOutcome::Upheld, Some("refund"))
        .unwrap();
    assert_eq!(resolved.status, DisputeStatus::Resolved);
    assert_eq!(resolved.outcome, Some(DisputeOutcome::Upheld));
    assert_eq!(resolved.resolved_by, Some(fx.admin));

    assert_eq!(fx.balance(&deal), dec(980));
    assert_eq!(fx.market.withdrawal(w.id).unwrap().status, WithdrawalStatus::Rejected);
    assert_eq!(fx.market.deal(deal.id).unwrap().status, DealStatus::Active);

    let err = fx
        .market
        .resolve_dispute(dispute.id, fx.admin, DisputeOutcome::Denied, None)
        .unwrap_err();
    assert!(matches!(err, DealbookError::DisputeNotOpen(_)));
    fx.assert_consistent();
}

#[test]
fn upheld_dispute_after_proof_rejects_the_withdrawal() {
    let fx = Fixture::new();
    let (investor, deal) = fx.deal();
    let w = fx.approved_withdrawal(&deal, dec(500));
    fx.market
        .submit_proof(w.id, fx.owner, "https://files.example/invoice-7.pdf")
        .unwrap();

    let dispute = fx
        .market
        .open_dispute(DisputeTarget::Withdrawal(w.id), investor, "invoice is not genuine")
        .unwrap();
    assert_eq!(dispute.target_prior_status, WithdrawalStatus::ProofSubmitted);

    fx.market
        .resolve_dispute(dispute.id, fx.admin, DisputeOutcome::Upheld, None)
        .unwrap();

    let w = fx.market.withdrawal(w.id).unwrap();
    assert_eq!(w.status, WithdrawalStatus::Rejected);
    assert_eq!(fx.balance(&deal), dec(980));
    assert_eq!(fx.market.deal(deal.id).unwrap().status, DealStatus::Active);
    assert_eq!(
        fx.market.request(deal.request_id).unwrap().status,
        RequestStatus::InProgress
    );
    fx.assert_consistent();
}

#[test]
fn denied_dispute_lets_withdrawal_proceed() {
    let fx = Fixture::new();
    let (investor, deal) = fx.deal();

    // Approved: back to approved.
    let a = fx.approved_withdrawal(&deal, dec(300));
    let d = fx
        .market
        .open_dispute(DisputeTarget::Withdrawal(a.id), investor, "duplicate")
        .unwrap();
    fx.market
        .resolve_dispute(d.id, fx.admin, DisputeOutcome::Denied, None)
        .unwrap();
    assert_eq!(fx.market.withdrawal(a.id).unwrap().status, WithdrawalStatus::Approved);
    assert_eq!(fx.balance(&deal), dec(680));

    // Proof submitted: on to resolved.
    fx.market
        .submit_proof(a.id, fx.owner, "https://files.example/a.pdf")
        .unwrap();
    let d = fx
        .market
        .open_dispute(DisputeTarget::Withdrawal(a.id), investor, "proof is forged")
        .unwrap();
    fx.market
        .resolve_dispute(d.id, fx.admin, DisputeOutcome::Denied, None)
        .unwrap();
    assert_eq!(fx.market.withdrawal(a.id).unwrap().status, WithdrawalStatus::Resolved);
    assert_eq!(fx.balance(&deal), dec(680));
    assert_eq!(fx.market.disputes_for_withdrawal(a.id).unwrap().len(), 2);
    fx.assert_consistent();
}

#[test]
fn dismissed_dispute_restores_prior_status() {
    let fx = Fixture::new();
    let (investor, deal) = fx.deal();
    let w = fx.approved_withdrawal(&deal, dec(100));
    fx.market
        .submit_proof(w.id, fx.owner, "https://files.example/w.pdf")
        .unwrap();

    let d = fx
        .market
        .open_dispute(DisputeTarget::Withdrawal(w.id), investor, "wrong account")
        .unwrap();
    let dismissed = fx
        .market
        .dismiss_dispute(d.id, fx.admin, Some("not a valid contest"))
        .unwrap();
    assert_eq!(dismissed.status, DisputeStatus::Rejected);
    assert!(dismissed.outcome.is_none());
    assert_eq!(
        fx.market.withdrawal(w.id).unwrap().status,
        WithdrawalStatus::ProofSubmitted
    );
    assert_eq!(fx.balance(&deal), dec(880));
    assert_eq!(fx.market.deal(deal.id).unwrap().status, DealStatus::Active);
    assert!(fx.sink.kinds().contains(&"dispute_dismissed"));
}

#[test]
fn dispute_preconditions() {
    let fx = Fixture::new();
    let (investor, deal) = fx.deal();
    let outsider = fx.user(Role::Investor);

    let requested = fx
        .market
        .request_withdrawal(deal.id, fx.owner, dec(100), "rent")
        .unwrap();
    let err = fx
        .market
        .open_dispute(DisputeTarget::Withdrawal(requested.id), investor, "early")
        .unwrap_err();
    assert!(matches!(err, DealbookError::WithdrawalNotDisputable { .. }));

    let w = fx.approved_withdrawal(&deal, dec(100));
    let err = fx
        .market
        .open_dispute(DisputeTarget::Withdrawal(w.id), outsider, "meddling")
        .unwrap_err();
    assert!(matches!(err, DealbookError::NotAuthorized { .. }));

    let err = fx
        .market
        .open_dispute(DisputeTarget::Withdrawal(w.id), investor, " ")
        .unwrap_err();
    assert!(matches!(err, DealbookError::InvalidDispute { .. }));

    let first = fx
        .market
        .open_dispute(DisputeTarget::Withdrawal(w.id), investor, "contest")
        .unwrap();
    let err = fx
        .market
        .open_dispute(DisputeTarget::Withdrawal(w.id), fx.owner, "again")
        .unwrap_err();
    assert!(matches!(
        err,
        DealbookError::DisputeAlreadyOpen { existing, .. } if existing == first.id
    ));

    let err = fx
        .market
        .resolve_dispute(first.id, investor, DisputeOutcome::Upheld, None)
        .unwrap_err();
    assert!(matches!(err, DealbookError::NotAuthorized { .. }));

    let err = fx
        .market
        .resolve_dispute(DisputeId::new(), fx.admin, DisputeOutcome::Upheld, None)
        .unwrap_err();
    assert!(matches!(err, DealbookError::DisputeNotFound(_)));
}

// ---------------------------------------------------------------------------
// Journal
// ---------------------------------------------------------------------------

#[test]
fn journal_records_the_whole_story() {
    let fx = Fixture::new();
    let (investor, deal) = fx.deal();
    let w = fx.approved_withdrawal(&deal, dec(500));
    let d = fx
        .market
        .open_dispute(DisputeTarget::Withdrawal(w.id), investor, "contest")
        .unwrap();
    fx.market
        .resolve_dispute(d.id, fx.admin, DisputeOutcome::Upheld, None)
        .unwrap();

    let history: Vec<&str> = fx
        .ledger
        .history_of(EntityRef::Withdrawal(w.id))
        .iter()
        .map(|e| e.event.kind())
        .collect();
    assert_eq!(history, vec!["withdrawal_requested", "withdrawal_approved"]);

    let journaled: Vec<&str> = fx
        .ledger
        .journal_entries()
        .iter()
        .map(|e| e.event.kind())
        .collect();
    assert_eq!(journaled, fx.sink.kinds());
    fx.assert_consistent();
}
