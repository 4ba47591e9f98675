//! Offer Matching Engine.
//!
//! Acceptance is the arbitration point for a request: the winning commit
//! bumps the request's version while moving it to `in_progress`, so any
//! concurrent acceptance conflicts, re-reads, and finds the request
//! already resolved.

use dealbook_ledger::{Guard, Versioned, Write, WriteSet};
use dealbook_types::offer::{REJECTED_BY_OWNER, SUPERSEDED, WITHDRAWN_BY_OFFEROR};
use dealbook_types::{
    Action, Deal, DealbookError, EntityRef, MarketEvent, Offer, OfferId, OfferTerms, RequestId,
    RequestStatus, Result, UserId,
};
use tracing::info;

use crate::deals::{ensure_positive_net, form_deal};
use crate::marketplace::{Marketplace, Step, require};

impl Marketplace {
    /// Submit `terms` against an `open`/`under_review` request.
    ///
    /// # Errors
    /// - `RequestNotFound`
    /// - `NotAuthorized` without `SubmitOffer`
    /// - `InvalidOffer` for the owner's own request or terms that do not
    ///   fit the request kind
    /// - `RequestNotOpen` if the request no longer accepts offers
    pub fn submit_offer(
        &self,
        request_id: RequestId,
        offeror: UserId,
        terms: OfferTerms,
    ) -> Result<Offer> {
        let offer = self.transact("submit_offer", || {
            let request = self.load_request(request_id)?;
            self.authorize(offeror, Action::SubmitOffer, EntityRef::Request(request_id))?;
            if request.row.is_owned_by(offeror) {
                return Err(DealbookError::InvalidOffer {
                    reason: "owners cannot offer on their own request".to_string(),
                });
            }
            if !request.row.status.accepts_offers() {
                return Err(DealbookError::RequestNotOpen {
                    id: request_id,
                    status: request.row.status,
                });
            }
            terms.validate_for(request.row.kind)?;
            ensure_positive_net(terms.amount, &self.config.commission)?;
            if let Some(message) = &terms.message {
                self.check_text(message, "message")
                    .map_err(|reason| DealbookError::InvalidOffer { reason })?;
            }

            let offer = Offer::new(request_id, offeror, terms.clone());
            let set = WriteSet::new()
                .guard(Guard::Request {
                    id: request_id,
                    version: request.version,
                })
                .write(Write::InsertOffer(offer.clone()))
                .event(MarketEvent::OfferSubmitted {
                    offer_id: offer.id,
                    request_id,
                    offered_by_id: offeror,
                    amount: offer.terms.amount,
                });
            Ok(Step::Commit(set, offer))
        })?;

        info!(offer_id = %offer.id, %request_id, %offeror, amount = %offer.terms.amount, "Offer submitted");
        Ok(offer)
    }

    /// Accept a pending offer, forming its deal and rejecting every other
    /// pending offer on the request as `"superseded"`, all in one commit.
    ///
    /// # Errors
    /// - `OfferNotFound` / `RequestNotFound`
    /// - `NotAuthorized` unless `actor` owns the request and holds `AcceptOffer`
    /// - `RequestAlreadyResolved` if another offer won the request
    /// - `RequestNotOpen` if the request was closed without an acceptance
    /// - `OfferNotPending` if this offer was rejected or withdrawn
    pub fn accept_offer(&self, offer_id: OfferId, actor: UserId) -> Result<Deal> {
        let deal = self.transact("accept_offer", || {
            let offer = self.load_offer(offer_id)?;
            let request = self.load_request(offer.row.request_id)?;
            self.authorize(actor, Action::AcceptOffer, EntityRef::Offer(offer_id))?;
            require(request.row.is_owned_by(actor), actor, Action::AcceptOffer)?;

            let resolved = request.row.accepted_offer_id.is_some()
                || matches!(
                    request.row.status,
                    RequestStatus::InProgress | RequestStatus::Completed
                );
            if resolved {
                return Err(DealbookError::RequestAlreadyResolved(request.row.id));
            }
            if !request.row.status.accepts_offers() {
                return Err(DealbookError::RequestNotOpen {
                    id: request.row.id,
                    status: request.row.status,
                });
            }

            let mut accepted = offer.row.clone();
            accepted.mark_accepted()?;
            let mut req = request.row.clone();
            let from = req.status;
            req.transition_to(RequestStatus::InProgress)?;
            req.accepted_offer_id = Some(offer_id);
            let deal = form_deal(&req, &accepted, &self.config.commission)?;

            let set = WriteSet::new()
                .write(Write::UpdateRequest {
                    expected: request.version,
                    row: req.clone(),
                })
                .write(Write::UpdateOffer {
                    expected: offer.version,
                    row: accepted,
                })
                .write(Write::InsertDeal(deal.clone()))
                .write(Write::RejectPendingOffers {
                    request_id: req.id,
                    except: Some(offer_id),
                    reason: SUPERSEDED.to_string(),
                })
                .event(MarketEvent::OfferAccepted {
                    offer_id,
                    request_id: req.id,
                    deal_id: deal.id,
                })
                .event(MarketEvent::DealFormed {
                    deal_id: deal.id,
                    gross_amount: deal.gross_amount,
                    commission_amount: deal.commission_amount,
                    net_amount: deal.net_amount,
                })
                .event(MarketEvent::RequestStatusChanged {
                    request_id: req.id,
                    from,
                    to: RequestStatus::InProgress,
                    actor,
                });
            Ok(Step::Commit(set, deal))
        })?;

        info!(
            %offer_id,
            deal_id = %deal.id,
            request_id = %deal.request_id,
            net = %deal.net_amount,
            "Offer accepted"
        );
        Ok(deal)
    }

    /// Reject a pending offer. The request's status is left alone, even
    /// when no pending offers remain.
    ///
    /// # Errors
    /// - `OfferNotFound` / `RequestNotFound`
    /// - `NotAuthorized` unless `actor` owns the request and holds `RejectOffer`
    /// - `OfferNotPending`
    pub fn reject_offer(&self, offer_id: OfferId, actor: UserId) -> Result<Offer> {
        let rejected = self.transact("reject_offer", || {
            let offer = self.load_offer(offer_id)?;
            let request = self.load_request(offer.row.request_id)?;
            self.authorize(actor, Action::RejectOffer, EntityRef::Offer(offer_id))?;
            require(request.row.is_owned_by(actor), actor, Action::RejectOffer)?;
            stage_rejection(offer, REJECTED_BY_OWNER)
        })?;

        info!(%offer_id, %actor, "Offer rejected");
        Ok(rejected)
    }

    /// Retract one's own pending offer.
    ///
    /// # Errors
    /// - `OfferNotFound`
    /// - `NotAuthorized` unless `offeror` submitted it and holds `WithdrawOffer`
    /// - `OfferNotPending`
    pub fn withdraw_offer(&self, offer_id: OfferId, offeror: UserId) -> Result<Offer> {
        let withdrawn = self.transact("withdraw_offer", || {
            let offer = self.load_offer(offer_id)?;
            self.authorize(offeror, Action::WithdrawOffer, EntityRef::Offer(offer_id))?;
            require(offer.row.offered_by_id == offeror, offeror, Action::WithdrawOffer)?;
            stage_rejection(offer, WITHDRAWN_BY_OFFEROR)
        })?;

        info!(%offer_id, %offeror, "Offer withdrawn");
        Ok(withdrawn)
    }
}

fn stage_rejection(offer: Versioned<Offer>, reason: &str) -> Result<Step<Offer>> {
    let mut row = offer.row;
    row.mark_rejected(reason)?;
    let set = WriteSet::new()
        .write(Write::UpdateOffer {
            expected: offer.version,
            row: row.clone(),
        })
        .event(MarketEvent::OfferRejected {
            offer_id: row.id,
            request_id: row.request_id,
            reason: reason.to_string(),
        });
    Ok(Step::Commit(set, row))
}
