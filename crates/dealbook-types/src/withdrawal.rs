//! Withdrawal types.
//!
//! A withdrawal asks to release funds from a deal's balance. The balance
//! is only debited at approval, never at request time.
//!
//! ## State Machine
//!
//! ```text
//!   ┌───────────┐ approve ┌──────────┐ proof ┌─────────────────┐ confirm ┌──────────┐
//!   │ REQUESTED ├────────▶│ APPROVED ├──────▶│ PROOF_SUBMITTED ├────────▶│ RESOLVED │
//!   └─────┬─────┘         └────┬─────┘       └───────┬─────────┘         └──────────┘
//!         │ decline            │ dispute             │ dispute                ▲
//!         ▼                    ▼                     ▼                        │ denied
//!   ┌──────────┐  upheld  ┌──────────────────────────────┐                    │
//!   │ REJECTED │◀─────────┤           DISPUTED           ├────────────────────┘
//!   └──────────┘          └──────────────────────────────┘
//! ```
//!
//! A denied or dismissed dispute returns an `approved` withdrawal to
//! `approved`; a `proof_submitted` one moves on to `resolved` (denied)
//! or back to `proof_submitted` (dismissed).

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{DealId, DealbookError, Result, UserId, WithdrawalId};

/// Lifecycle status of a withdrawal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalStatus {
    Requested,
    Approved,
    ProofSubmitted,
    Disputed,
    Resolved,
    Rejected,
}

impl WithdrawalStatus {
    #[must_use]
    pub fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Requested, Self::Approved | Self::Rejected)
                | (Self::Approved, Self::ProofSubmitted | Self::Disputed)
                | (Self::ProofSubmitted, Self::Resolved | Self::Disputed)
                | (
                    Self::Disputed,
                    Self::Resolved | Self::Rejected | Self::Approved | Self::ProofSubmitted
                )
        )
    }

    /// Whether the amount is currently taken out of the deal balance.
    #[must_use]
    pub fn holds_funds(self) -> bool {
        matches!(
            self,
            Self::Approved | Self::ProofSubmitted | Self::Disputed | Self::Resolved
        )
    }

    /// Only approved withdrawals, with or without proof, may be contested.
    #[must_use]
    pub fn is_disputable(self) -> bool {
        matches!(self, Self::Approved | Self::ProofSubmitted)
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Resolved | Self::Rejected)
    }
}

impl fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Requested => write!(f, "requested"),
            Self::Approved => write!(f, "approved"),
            Self::ProofSubmitted => write!(f, "proof_submitted"),
            Self::Disputed => write!(f, "disputed"),
            Self::Resolved => write!(f, "resolved"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

/// A request to release funds from a deal's balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Withdrawal {
    pub id: WithdrawalId,
    pub deal_id: DealId,
    pub requested_by_id: UserId,
    pub amount: Decimal,
    pub reason: String,
    pub status: WithdrawalStatus,
    /// Reference to the proof-of-payment artifact. Only the reference is
    /// stored; the bytes live in the attachment store.
    pub proof_url: Option<String>,
    pub approved_by: Option<UserId>,
    pub approved_at: Option<DateTime<Utc>>,
    /// Note left by the admin who declined the withdrawal.
    pub decision_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Withdrawal {
    #[must_use]
    pub fn new(deal_id: DealId, requested_by_id: UserId, amount: Decimal, reason: String) -> Self {
        let now = Utc::now();
        Self {
            id: WithdrawalId::new(),
            deal_id,
            requested_by_id,
            amount,
            reason,
            status: WithdrawalStatus::Requested,
            proof_url: None,
            approved_by: None,
            approved_at: None,
            decision_note: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move to `target`, enforcing the withdrawal state machine.
    ///
    /// # Errors
    /// Returns `InvariantViolation` for an illegal move. Callers check the
    /// specific precondition first and report the typed error; this is
    /// the last line of defence.
    pub fn transition_to(&mut self, target: WithdrawalStatus) -> Result<()> {
        if !self.status.can_transition_to(target) {
            return Err(DealbookError::InvariantViolation {
                reason: format!(
                    "withdrawal {} cannot move from {} to {target}",
                    self.id, self.status
                ),
            });
        }
        self.status = target;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// `requested → approved`, recording the approver.
    ///
    /// # Errors
    /// Returns `WithdrawalNotRequested` unless the withdrawal is `requested`.
    pub fn approve(&mut self, approver: UserId) -> Result<()> {
        self.ensure_requested()?;
        self.transition_to(WithdrawalStatus::Approved)?;
        self.approved_by = Some(approver);
        self.approved_at = Some(self.updated_at);
        Ok(())
    }

    /// `requested → rejected`.
    ///
    /// # Errors
    /// Returns `WithdrawalNotRequested` unless the withdrawal is `requested`.
    pub fn decline(&mut self, note: Option<String>) -> Result<()> {
        self.ensure_requested()?;
        self.transition_to(WithdrawalStatus::Rejected)?;
        self.decision_note = note;
        Ok(())
    }

    /// `approved → proof_submitted`, storing the proof reference.
    ///
    /// # Errors
    /// Returns `WithdrawalNotApproved` unless the withdrawal is `approved`.
    pub fn attach_proof(&mut self, proof_url: String) -> Result<()> {
        if self.status != WithdrawalStatus::Approved {
            return Err(DealbookError::WithdrawalNotApproved {
                id: self.id,
                status: self.status,
            });
        }
        self.transition_to(WithdrawalStatus::ProofSubmitted)?;
        self.proof_url = Some(proof_url);
        Ok(())
    }

    /// `proof_submitted → resolved`.
    ///
    /// # Errors
    /// Returns `ProofNotSubmitted` unless proof has been submitted.
    pub fn confirm_release(&mut self) -> Result<()> {
        if self.status != WithdrawalStatus::ProofSubmitted {
            return Err(DealbookError::ProofNotSubmitted {
                id: self.id,
                status: self.status,
            });
        }
        self.transition_to(WithdrawalStatus::Resolved)
    }

    fn ensure_requested(&self) -> Result<()> {
        if self.status == WithdrawalStatus::Requested {
            Ok(())
        } else {
            Err(DealbookError::WithdrawalNotRequested {
                id: self.id,
                status: self.status,
            })
        }
    }
}
