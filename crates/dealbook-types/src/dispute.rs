//! Dispute types.
//!
//! A dispute contests a withdrawal's validity. At most one dispute per
//! target is open at a time. The outcome decides whether the withdrawn
//! amount goes back to the deal balance.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{DealId, DealbookError, DisputeId, Result, UserId, WithdrawalId, WithdrawalStatus};

/// The entity a dispute is raised against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "target_type", content = "target_id", rename_all = "snake_case")]
pub enum DisputeTarget {
    Withdrawal(WithdrawalId),
}

impl DisputeTarget {
    #[must_use]
    pub fn withdrawal_id(&self) -> WithdrawalId {
        match self {
            Self::Withdrawal(id) => *id,
        }
    }
}

impl fmt::Display for DisputeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Withdrawal(id) => write!(f, "{id}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeStatus {
    Open,
    /// Decided on the merits; see [`DisputeOutcome`].
    Resolved,
    /// Dismissed as not a valid contest.
    Rejected,
}

impl fmt::Display for DisputeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Resolved => write!(f, "resolved"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

/// Decision on a resolved dispute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeOutcome {
    /// The contest stands: the withdrawal is rejected and its amount
    /// restored to the deal balance.
    Upheld,
    /// The withdrawal proceeds.
    Denied,
}

impl fmt::Display for DisputeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Upheld => write!(f, "upheld"),
            Self::Denied => write!(f, "denied"),
        }
    }
}

/// A contest raised against a withdrawal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dispute {
    pub id: DisputeId,
    pub target: DisputeTarget,
    /// Deal the disputed withdrawal draws on.
    pub deal_id: DealId,
    pub opened_by_id: UserId,
    pub reason: String,
    pub status: DisputeStatus,
    pub outcome: Option<DisputeOutcome>,
    pub resolution_note: Option<String>,
    /// Withdrawal status before the dispute moved it to `disputed`.
    pub target_prior_status: WithdrawalStatus,
    pub resolved_by: Option<UserId>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Dispute {
    #[must_use]
    pub fn open(
        withdrawal_id: WithdrawalId,
        deal_id: DealId,
        opened_by_id: UserId,
        reason: String,
        target_prior_status: WithdrawalStatus,
    ) -> Self {
        Self {
            id: DisputeId::new(),
            target: DisputeTarget::Withdrawal(withdrawal_id),
            deal_id,
            opened_by_id,
            reason,
            status: DisputeStatus::Open,
            outcome: None,
            resolution_note: None,
            target_prior_status,
            resolved_by: None,
            resolved_at: None,
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.status == DisputeStatus::Open
    }

    /// # Errors
    /// Returns `DisputeNotOpen` if already decided or dismissed.
    pub fn ensure_open(&self) -> Result<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(DealbookError::DisputeNotOpen(self.id))
        }
    }

    /// The status the disputed withdrawal moves to for `outcome`.
    #[must_use]
    pub fn withdrawal_status_after(&self, outcome: DisputeOutcome) -> WithdrawalStatus {
        match (outcome, self.target_prior_status) {
            (DisputeOutcome::Upheld, _) => WithdrawalStatus::Rejected,
            (DisputeOutcome::Denied, WithdrawalStatus::ProofSubmitted) => WithdrawalStatus::Resolved,
            (DisputeOutcome::Denied, prior) => prior,
        }
    }

    /// `open → resolved` with `outcome`.
    ///
    /// # Errors
    /// Returns `DisputeNotOpen` if the dispute is closed.
    pub fn resolve(
        &mut self,
        resolver: UserId,
        outcome: DisputeOutcome,
        note: Option<String>,
    ) -> Result<()> {
        self.close(DisputeStatus::Resolved, resolver, note)?;
        self.outcome = Some(outcome);
        Ok(())
    }

    /// `open → rejected`: dismissed without a decision on the merits.
    ///
    /// # Errors
    /// Returns `DisputeNotOpen` if the dispute is closed.
    pub fn dismiss(&mut self, resolver: UserId, note: Option<String>) -> Result<()> {
        self.close(DisputeStatus::Rejected, resolver, note)
    }

    fn close(&mut self, status: DisputeStatus, resolver: UserId, note: Option<String>) -> Result<()> {
        self.ensure_open()?;
        self.status = status;
        self.resolved_by = Some(resolver);
        self.resolved_at = Some(Utc::now());
        self.resolution_note = note;
        Ok(())
    }
}
