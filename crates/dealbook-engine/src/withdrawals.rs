//! Withdrawal Workflow.
//!
//! The deal balance is debited at approval, inside the same commit that
//! moves the withdrawal to `approved`. That commit rewrites the deal at
//! the version the balance was read from, so two approvals racing on one
//! deal cannot both spend the same funds.

use dealbook_ledger::{Guard, Write, WriteSet};
use dealbook_types::{
    Action, DealId, DealbookError, EntityRef, MarketEvent, Result, UserId, Withdrawal,
    WithdrawalId, WithdrawalStatus, check_amount,
};
use rust_decimal::Decimal;
use tracing::info;

use crate::deals::replace_withdrawal;
use crate::marketplace::{Marketplace, Step, require};

impl Marketplace {
    /// Ask to draw `amount` from a deal. The balance is only checked here,
    /// not reserved.
    ///
    /// # Errors
    /// - `DealNotFound`
    /// - `NotAuthorized` unless `requester` is a deal party holding
    ///   `RequestWithdrawal`
    /// - `InvalidWithdrawal` for a non-positive amount, more than two
    ///   decimals, or a blank/over-long reason
    /// - `DealNotActive`
    /// - `InsufficientBalance` if `amount` exceeds the current balance
    pub fn request_withdrawal(
        &self,
        deal_id: DealId,
        requester: UserId,
        amount: Decimal,
        reason: &str,
    ) -> Result<Withdrawal> {
        let withdrawal = self.transact("request_withdrawal", || {
            let deal = self.load_deal(deal_id)?;
            self.authorize(requester, Action::RequestWithdrawal, EntityRef::Deal(deal_id))?;
            require(deal.row.is_party(requester), requester, Action::RequestWithdrawal)?;

            check_amount(amount).map_err(|reason| DealbookError::InvalidWithdrawal { reason })?;
            self.check_text(reason, "reason")
                .map_err(|reason| DealbookError::InvalidWithdrawal { reason })?;
            deal.row.ensure_active()?;
            deal.row.ensure_covers(amount)?;

            let w = Withdrawal::new(deal_id, requester, amount, reason.to_string());
            let set = WriteSet::new()
                .guard(Guard::Deal {
                    id: deal_id,
                    version: deal.version,
                })
                .write(Write::InsertWithdrawal(w.clone()))
                .event(MarketEvent::WithdrawalRequested {
                    withdrawal_id: w.id,
                    deal_id,
                    amount,
                });
            Ok(Step::Commit(set, w))
        })?;

        info!(withdrawal_id = %withdrawal.id, %deal_id, %requester, %amount, "Withdrawal requested");
        Ok(withdrawal)
    }

    /// Approve a `requested` withdrawal, debiting the deal balance.
    ///
    /// Approving an already `approved` withdrawal returns it unchanged.
    ///
    /// # Errors
    /// - `WithdrawalNotFound`
    /// - `NotAuthorized` without `ApproveWithdrawal`
    /// - `WithdrawalNotRequested` from any state but `requested`/`approved`
    /// - `DealNotActive`
    /// - `InsufficientBalance` if the balance no longer covers the amount
    pub fn approve_withdrawal(&self, withdrawal_id: WithdrawalId, approver: UserId) -> Result<Withdrawal> {
        let mut fresh = false;
        let approved = self.transact("approve_withdrawal", || {
            let w = self.load_withdrawal(withdrawal_id)?;
            self.authorize(approver, Action::ApproveWithdrawal, EntityRef::Withdrawal(withdrawal_id))?;
            if w.row.status == WithdrawalStatus::Approved {
                fresh = false;
                return Ok(Step::Done(w.row));
            }
            let deal = self.load_deal(w.row.deal_id)?;

            let mut row = w.row.clone();
            row.approve(approver)?;
            deal.row.ensure_active()?;
            let mut debited = deal.row.clone();
            debited.debit(row.amount)?;

            let set = WriteSet::new()
                .write(Write::UpdateDeal {
                    expected: deal.version,
                    row: debited.clone(),
                })
                .write(Write::UpdateWithdrawal {
                    expected: w.version,
                    row: row.clone(),
                })
                .event(MarketEvent::WithdrawalApproved {
                    withdrawal_id,
                    deal_id: debited.id,
                    amount: row.amount,
                    balance_after: debited.balance,
                });
            fresh = true;
            Ok(Step::Commit(set, row))
        })?;

        if fresh {
            info!(%withdrawal_id, %approver, amount = %approved.amount, "Withdrawal approved");
        } else {
            info!(%withdrawal_id, "Withdrawal already approved");
        }
        Ok(approved)
    }

    /// Decline a `requested` withdrawal. The balance is untouched.
    ///
    /// # Errors
    /// - `WithdrawalNotFound`
    /// - `NotAuthorized` without `RejectWithdrawal`
    /// - `InvalidWithdrawal` for a blank/over-long note
    /// - `WithdrawalNotRequested`
    pub fn reject_withdrawal(
        &self,
        withdrawal_id: WithdrawalId,
        approver: UserId,
        note: Option<&str>,
    ) -> Result<Withdrawal> {
        let rejected = self.transact("reject_withdrawal", || {
            let w = self.load_withdrawal(withdrawal_id)?;
            self.authorize(approver, Action::RejectWithdrawal, EntityRef::Withdrawal(withdrawal_id))?;
            if let Some(note) = note {
                self.check_text(note, "note")
                    .map_err(|reason| DealbookError::InvalidWithdrawal { reason })?;
            }
            let mut row = w.row.clone();
            row.decline(note.map(str::to_string))?;

            let deal = self.load_deal(row.deal_id)?;
            let siblings = replace_withdrawal(self.ledger.withdrawals_for_deal(row.deal_id)?, &row);
            let mut set = WriteSet::new()
                .write(Write::UpdateWithdrawal {
                    expected: w.version,
                    row: row.clone(),
                })
                .event(MarketEvent::WithdrawalRejected {
                    withdrawal_id,
                    deal_id: row.deal_id,
                });
            self.stage_deal(&mut set, &deal, deal.row.clone(), &siblings, approver)?;
            Ok(Step::Commit(set, row))
        })?;

        info!(%withdrawal_id, %approver, "Withdrawal rejected");
        Ok(rejected)
    }

    /// Attach proof of payment to an `approved` withdrawal.
    ///
    /// Re-submitting the same reference on a `proof_submitted` withdrawal
    /// returns it unchanged.
    ///
    /// # Errors
    /// - `WithdrawalNotFound`
    /// - `NotAuthorized` unless `submitter` initiated the withdrawal and
    ///   holds `SubmitProof`
    /// - `WithdrawalNotApproved`
    /// - `InvalidWithdrawal` for a blank reference
    /// - `ProofNotResolvable` if the attachment store cannot resolve it
    pub fn submit_proof(
        &self,
        withdrawal_id: WithdrawalId,
        submitter: UserId,
        proof_url: &str,
    ) -> Result<Withdrawal> {
        let proof_url = proof_url.trim();
        let submitted = self.transact("submit_proof", || {
            let w = self.load_withdrawal(withdrawal_id)?;
            self.authorize(submitter, Action::SubmitProof, EntityRef::Withdrawal(withdrawal_id))?;
            require(w.row.requested_by_id == submitter, submitter, Action::SubmitProof)?;

            if w.row.status == WithdrawalStatus::ProofSubmitted
                && w.row.proof_url.as_deref() == Some(proof_url)
            {
                return Ok(Step::Done(w.row));
            }
            if w.row.status != WithdrawalStatus::Approved {
                return Err(DealbookError::WithdrawalNotApproved {
                    id: withdrawal_id,
                    status: w.row.status,
                });
            }
            if proof_url.is_empty() {
                return Err(DealbookError::InvalidWithdrawal {
                    reason: "proof reference must not be empty".to_string(),
                });
            }
            if self.config.require_resolvable_proof && self.attachments.resolve(proof_url).is_none() {
                return Err(DealbookError::ProofNotResolvable {
                    url: proof_url.to_string(),
                });
            }

            let mut row = w.row.clone();
            row.attach_proof(proof_url.to_string())?;
            let set = WriteSet::new()
                .write(Write::UpdateWithdrawal {
                    expected: w.version,
                    row: row.clone(),
                })
                .event(MarketEvent::ProofSubmitted {
                    withdrawal_id,
                    proof_url: proof_url.to_string(),
                });
            Ok(Step::Commit(set, row))
        })?;

        info!(%withdrawal_id, %submitter, "Proof submitted");
        Ok(submitted)
    }

    /// Record that funds were released: `proof_submitted → resolved`.
    /// May complete the deal. Repeating it on a `resolved` withdrawal
    /// returns it unchanged.
    ///
    /// # Errors
    /// - `WithdrawalNotFound`
    /// - `NotAuthorized` without `ConfirmRelease`
    /// - `ProofNotSubmitted`
    pub fn confirm_release(&self, withdrawal_id: WithdrawalId, actor: UserId) -> Result<Withdrawal> {
        let released = self.transact("confirm_release", || {
            let w = self.load_withdrawal(withdrawal_id)?;
            self.authorize(actor, Action::ConfirmRelease, EntityRef::Withdrawal(withdrawal_id))?;
            if w.row.status == WithdrawalStatus::Resolved {
                return Ok(Step::Done(w.row));
            }
            let mut row = w.row.clone();
            row.confirm_release()?;

            let deal = self.load_deal(row.deal_id)?;
            let siblings = replace_withdrawal(self.ledger.withdrawals_for_deal(row.deal_id)?, &row);
            let mut set = WriteSet::new()
                .write(Write::UpdateWithdrawal {
                    expected: w.version,
                    row: row.clone(),
                })
                .event(MarketEvent::WithdrawalResolved {
                    withdrawal_id,
                    deal_id: row.deal_id,
                });
            self.stage_deal(&mut set, &deal, deal.row.clone(), &siblings, actor)?;
            Ok(Step::Commit(set, row))
        })?;

        info!(%withdrawal_id, %actor, "Release confirmed");
        Ok(released)
    }
}
