//! Dispute Resolution Overlay.
//!
//! Opening, resolving and dismissing a dispute each commit the dispute,
//! its withdrawal and the deal together. Because every one of them
//! rewrites the withdrawal at the version it read, a dispute operation
//! and any other transition on the same withdrawal cannot interleave.

use dealbook_ledger::{Versioned, Write, WriteSet};
use dealbook_types::{
    Action, DealbookError, Dispute, DisputeId, DisputeOutcome, DisputeTarget, EntityRef,
    MarketEvent, Result, UserId, WithdrawalStatus,
};
use tracing::info;

use crate::deals::replace_withdrawal;
use crate::marketplace::{Marketplace, Step, require};

/// How an open dispute is closed.
#[derive(Debug, Clone, Copy)]
enum Closure {
    Decide(DisputeOutcome),
    Dismiss,
}

impl Marketplace {
    /// Contest an `approved` or `proof_submitted` withdrawal.
    ///
    /// The withdrawal moves to `disputed` (its prior status is kept on the
    /// dispute) and the deal to `disputed`.
    ///
    /// # Errors
    /// - `WithdrawalNotFound`
    /// - `NotAuthorized` unless `opener` is a deal party holding `OpenDispute`
    /// - `InvalidDispute` for a blank/over-long reason
    /// - `DisputeAlreadyOpen`
    /// - `WithdrawalNotDisputable`
    pub fn open_dispute(
        &self,
        target: DisputeTarget,
        opener: UserId,
        reason: &str,
    ) -> Result<Dispute> {
        let withdrawal_id = target.withdrawal_id();
        let dispute = self.transact("open_dispute", || {
            let w = self.load_withdrawal(withdrawal_id)?;
            let deal = self.load_deal(w.row.deal_id)?;
            self.authorize(opener, Action::OpenDispute, EntityRef::Withdrawal(withdrawal_id))?;
            require(deal.row.is_party(opener), opener, Action::OpenDispute)?;
            self.check_text(reason, "reason")
                .map_err(|reason| DealbookError::InvalidDispute { reason })?;

            if let Some(existing) = self.ledger.open_dispute_for(withdrawal_id)? {
                return Err(DealbookError::DisputeAlreadyOpen {
                    target: withdrawal_id,
                    existing: existing.row.id,
                });
            }
            if !w.row.status.is_disputable() {
                return Err(DealbookError::WithdrawalNotDisputable {
                    id: withdrawal_id,
                    status: w.row.status,
                });
            }

            let prior = w.row.status;
            let dispute = Dispute::open(withdrawal_id, deal.row.id, opener, reason.to_string(), prior);
            let mut row = w.row.clone();
            row.transition_to(WithdrawalStatus::Disputed)?;

            let siblings = replace_withdrawal(self.ledger.withdrawals_for_deal(deal.row.id)?, &row);
            let mut set = WriteSet::new()
                .write(Write::UpdateWithdrawal {
                    expected: w.version,
                    row,
                })
                .write(Write::InsertDispute(dispute.clone()))
                .event(MarketEvent::DisputeOpened {
                    dispute_id: dispute.id,
                    withdrawal_id,
                    opened_by_id: opener,
                });
            self.stage_deal(&mut set, &deal, deal.row.clone(), &siblings, opener)?;
            Ok(Step::Commit(set, dispute))
        })?;

        info!(dispute_id = %dispute.id, %withdrawal_id, %opener, "Dispute opened");
        Ok(dispute)
    }

    /// Decide an open dispute.
    ///
    /// `upheld`: the withdrawal is rejected and its amount restored to the
    /// deal balance. `denied`: the withdrawal proceeds, returning to
    /// `approved` or advancing to `resolved` if proof had been submitted.
    ///
    /// # Errors
    /// - `DisputeNotFound`
    /// - `NotAuthorized` without `ResolveDispute`
    /// - `DisputeNotOpen`
    pub fn resolve_dispute(
        &self,
        dispute_id: DisputeId,
        resolver: UserId,
        outcome: DisputeOutcome,
        note: Option<&str>,
    ) -> Result<Dispute> {
        let resolved = self.close_dispute(
            "resolve_dispute",
            dispute_id,
            resolver,
            Closure::Decide(outcome),
            note,
        )?;
        info!(%dispute_id, %resolver, %outcome, "Dispute resolved");
        Ok(resolved)
    }

    /// Dismiss an open dispute as not a valid contest. The withdrawal
    /// returns to the status it held before the dispute; the balance is
    /// unchanged.
    ///
    /// # Errors
    /// - `DisputeNotFound`
    /// - `NotAuthorized` without `ResolveDispute`
    /// - `DisputeNotOpen`
    pub fn dismiss_dispute(
        &self,
        dispute_id: DisputeId,
        resolver: UserId,
        note: Option<&str>,
    ) -> Result<Dispute> {
        let dismissed =
            self.close_dispute("dismiss_dispute", dispute_id, resolver, Closure::Dismiss, note)?;
        info!(%dispute_id, %resolver, "Dispute dismissed");
        Ok(dismissed)
    }

    fn close_dispute(
        &self,
        operation: &'static str,
        dispute_id: DisputeId,
        resolver: UserId,
        closure: Closure,
        note: Option<&str>,
    ) -> Result<Dispute> {
        self.transact(operation, || {
            let dispute: Versioned<Dispute> = self.load_dispute(dispute_id)?;
            self.authorize(resolver, Action::ResolveDispute, EntityRef::Dispute(dispute_id))?;
            if let Some(note) = note {
                self.check_text(note, "note")
                    .map_err(|reason| DealbookError::InvalidDispute { reason })?;
            }
            dispute.row.ensure_open()?;

            let withdrawal_id = dispute.row.target.withdrawal_id();
            let w = self.load_withdrawal(withdrawal_id)?;
            let deal = self.load_deal(w.row.deal_id)?;

            let mut closed = dispute.row.clone();
            let mut withdrawal = w.row.clone();
            let mut updated_deal = deal.row.clone();
            let note = note.map(str::to_string);

            let event = match closure {
                Closure::Decide(outcome) => {
                    let next = closed.withdrawal_status_after(outcome);
                    if outcome == DisputeOutcome::Upheld {
                        updated_deal.credit(withdrawal.amount)?;
                    }
                    withdrawal.transition_to(next)?;
                    closed.resolve(resolver, outcome, note)?;
                    MarketEvent::DisputeResolved {
                        dispute_id,
                        withdrawal_id,
                        outcome,
                        balance_after: updated_deal.balance,
                    }
                }
                Closure::Dismiss => {
                    withdrawal.transition_to(closed.target_prior_status)?;
                    closed.dismiss(resolver, note)?;
                    MarketEvent::DisputeDismissed {
                        dispute_id,
                        withdrawal_id,
                    }
                }
            };

            let siblings = replace_withdrawal(
                self.ledger.withdrawals_for_deal(deal.row.id)?,
                &withdrawal,
            );
            let mut set = WriteSet::new()
                .write(Write::UpdateDispute {
                    expected: dispute.version,
                    row: closed.clone(),
                })
                .write(Write::UpdateWithdrawal {
                    expected: w.version,
                    row: withdrawal,
                })
                .event(event);
            self.stage_deal(&mut set, &deal, updated_deal, &siblings, resolver)?;
            Ok(Step::Commit(set, closed))
        })
    }
}
