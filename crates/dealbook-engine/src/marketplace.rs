//! The `Marketplace` facade.
//!
//! Owns the ledger handle, the collaborator ports and the configuration.
//! The transition contracts are implemented in sibling modules as further
//! `impl Marketplace` blocks:
//!
//! | Module          | Contracts                                                    |
//! |-----------------|--------------------------------------------------------------|
//! | `requests`      | create, status override, close                               |
//! | `offers`        | submit, accept, reject, withdraw                             |
//! | `deals`         | formation (internal), completion                             |
//! | `withdrawals`   | request, approve, reject, submit proof, confirm release      |
//! | `disputes`      | open, resolve, dismiss                                       |
//!
//! Every mutating contract follows the same shape: read the rows it needs,
//! authorize, check preconditions, build one [`WriteSet`], commit. A lost
//! version race re-runs the whole attempt against fresh reads.

use std::sync::Arc;

use dealbook_ledger::{CommitReceipt, LedgerStore, Versioned, WriteSet};
use dealbook_types::{
    Action, Deal, DealId, DealbookError, Dispute, DisputeId, EntityRef, MarketplaceConfig, Offer,
    OfferId, Request, RequestId, Result, UserId, Withdrawal, WithdrawalId,
};
use tracing::warn;

use crate::ports::{AttachmentStore, NotificationSink, PolicyGate, TracingSink, UrlAttachmentStore};
use crate::retry::with_retries;

/// Outcome of one attempt at a transition.
pub(crate) enum Step<T> {
    /// Commit `set`, then hand back `value`.
    Commit(WriteSet, T),
    /// Nothing to change; the transition already happened.
    Done(T),
}

/// Entry point to the marketplace core. Cheap to share behind `Arc`.
pub struct Marketplace {
    pub(crate) ledger: Arc<dyn LedgerStore>,
    pub(crate) gate: Arc<dyn PolicyGate>,
    pub(crate) sink: Arc<dyn NotificationSink>,
    pub(crate) attachments: Arc<dyn AttachmentStore>,
    pub(crate) config: MarketplaceConfig,
}

impl std::fmt::Debug for Marketplace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Marketplace")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Marketplace {
    /// Build a marketplace over `ledger`, consulting `gate` for every
    /// mutating call. Events go to a [`TracingSink`] and proofs are
    /// resolved by [`UrlAttachmentStore`] until replaced.
    ///
    /// # Errors
    /// Returns `Configuration` if `config` fails validation.
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        gate: Arc<dyn PolicyGate>,
        config: MarketplaceConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            ledger,
            gate,
            sink: Arc::new(TracingSink),
            attachments: Arc::new(UrlAttachmentStore),
            config,
        })
    }

    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = sink;
        self
    }

    #[must_use]
    pub fn with_attachments(mut self, attachments: Arc<dyn AttachmentStore>) -> Self {
        self.attachments = attachments;
        self
    }

    #[must_use]
    pub fn config(&self) -> &MarketplaceConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub fn request(&self, id: RequestId) -> Result<Request> {
        Ok(self.load_request(id)?.row)
    }

    pub fn offer(&self, id: OfferId) -> Result<Offer> {
        Ok(self.load_offer(id)?.row)
    }

    /// Offers of a request in submission order.
    pub fn offers_for_request(&self, id: RequestId) -> Result<Vec<Offer>> {
        self.load_request(id)?;
        self.ledger.offers_for_request(id)
    }

    pub fn deal(&self, id: DealId) -> Result<Deal> {
        Ok(self.load_deal(id)?.row)
    }

    /// The deal formed from `offer`, if it was accepted.
    pub fn deal_for_offer(&self, offer: OfferId) -> Result<Option<Deal>> {
        self.load_offer(offer)?;
        Ok(self.ledger.deal_for_offer(offer)?.map(Versioned::into_row))
    }

    pub fn withdrawal(&self, id: WithdrawalId) -> Result<Withdrawal> {
        Ok(self.load_withdrawal(id)?.row)
    }

    pub fn withdrawals_for_deal(&self, id: DealId) -> Result<Vec<Withdrawal>> {
        self.load_deal(id)?;
        self.ledger.withdrawals_for_deal(id)
    }

    pub fn dispute(&self, id: DisputeId) -> Result<Dispute> {
        Ok(self.load_dispute(id)?.row)
    }

    pub fn disputes_for_withdrawal(&self, id: WithdrawalId) -> Result<Vec<Dispute>> {
        self.load_withdrawal(id)?;
        self.ledger.disputes_for_withdrawal(id)
    }

    // -----------------------------------------------------------------------
    // Shared plumbing
    // -----------------------------------------------------------------------

    pub(crate) fn load_request(&self, id: RequestId) -> Result<Versioned<Request>> {
        self.ledger
            .request(id)?
            .ok_or(DealbookError::RequestNotFound(id))
    }

    pub(crate) fn load_offer(&self, id: OfferId) -> Result<Versioned<Offer>> {
        self.ledger.offer(id)?.ok_or(DealbookError::OfferNotFound(id))
    }

    pub(crate) fn load_deal(&self, id: DealId) -> Result<Versioned<Deal>> {
        self.ledger.deal(id)?.ok_or(DealbookError::DealNotFound(id))
    }

    pub(crate) fn load_withdrawal(&self, id: WithdrawalId) -> Result<Versioned<Withdrawal>> {
        self.ledger
            .withdrawal(id)?
            .ok_or(DealbookError::WithdrawalNotFound(id))
    }

    pub(crate) fn load_dispute(&self, id: DisputeId) -> Result<Versioned<Dispute>> {
        self.ledger
            .dispute(id)?
            .ok_or(DealbookError::DisputeNotFound(id))
    }

    /// Ask the policy gate.
    ///
    /// # Errors
    /// `NotAuthorized` if the gate says no.
    pub(crate) fn authorize(&self, actor: UserId, action: Action, entity: EntityRef) -> Result<()> {
        if self.gate.is_authorized(actor, action, entity) {
            Ok(())
        } else {
            warn!(%actor, %action, %entity, "Policy gate denied");
            Err(DealbookError::NotAuthorized { actor, action })
        }
    }

    /// Reject free text that is blank or over the configured length.
    pub(crate) fn check_text(&self, text: &str, what: &str) -> std::result::Result<(), String> {
        if text.trim().is_empty() {
            return Err(format!("{what} must not be empty"));
        }
        let len = text.chars().count();
        if len > self.config.max_reason_len {
            return Err(format!(
                "{what} is {len} characters, limit is {}",
                self.config.max_reason_len
            ));
        }
        Ok(())
    }

    /// Run `attempt` under the retry budget, committing what it stages and
    /// emitting the committed events.
    pub(crate) fn transact<T>(
        &self,
        operation: &'static str,
        mut attempt: impl FnMut() -> Result<Step<T>>,
    ) -> Result<T> {
        let committed = with_retries(operation, self.config.max_commit_retries, || {
            match attempt()? {
                Step::Commit(set, value) => {
                    let receipt = self.ledger.commit(set)?;
                    Ok((value, Some(receipt)))
                }
                Step::Done(value) => Ok((value, None)),
            }
        })?;
        let (value, receipt) = committed;
        if let Some(receipt) = receipt {
            self.publish(&receipt);
        }
        Ok(value)
    }

    fn publish(&self, receipt: &CommitReceipt) {
        for event in &receipt.events {
            self.sink.emit(event);
        }
    }
}

/// Refuse unless `allowed`; used for ownership rules layered on the gate.
pub(crate) fn require(allowed: bool, actor: UserId, action: Action) -> Result<()> {
    if allowed {
        Ok(())
    } else {
        warn!(%actor, %action, "Actor lacks the relationship this action needs");
        Err(DealbookError::NotAuthorized { actor, action })
    }
}
