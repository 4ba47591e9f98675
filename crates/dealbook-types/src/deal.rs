//! Deal types.
//!
//! A deal is the binding agreement materialized from exactly one accepted
//! offer. Its commercial figures are fixed at formation; afterwards only
//! `balance` and `status` change.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::{CommissionPolicy, DealId, DealbookError, OfferId, RequestId, Result, UserId, constants};

/// Check that `amount` is a positive money value within
/// [`MAX_AMOUNT_UNITS`](constants::MAX_AMOUNT_UNITS) and carries no more
/// than [`AMOUNT_SCALE`](constants::AMOUNT_SCALE) significant decimals.
/// Trailing zeros (`5.000`) are fine.
///
/// # Errors
/// Returns a description of the first failed check.
pub fn check_amount(amount: Decimal) -> std::result::Result<(), String> {
    if amount <= Decimal::ZERO {
        return Err(format!("amount {amount} must be positive"));
    }
    if amount > Decimal::from(constants::MAX_AMOUNT_UNITS) {
        return Err(format!(
            "amount {amount} exceeds the limit of {}",
            constants::MAX_AMOUNT_UNITS
        ));
    }
    if amount.normalize().scale() > constants::AMOUNT_SCALE {
        return Err(format!(
            "amount {amount} has more than {} decimal places",
            constants::AMOUNT_SCALE
        ));
    }
    Ok(())
}

/// Lifecycle status of a deal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealStatus {
    /// Withdrawals may be requested against the balance.
    Active,
    /// Balance exhausted and every withdrawal settled.
    Completed,
    /// At least one dispute against one of its withdrawals is open.
    Disputed,
}

impl fmt::Display for DealStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Completed => write!(f, "completed"),
            Self::Disputed => write!(f, "disputed"),
        }
    }
}

/// Gross, commission and net figures of a deal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub gross_amount: Decimal,
    pub commission_rate: Decimal,
    pub commission_amount: Decimal,
    pub net_amount: Decimal,
}

impl Settlement {
    /// `commission = round(gross * rate, 2)`, `net = gross - commission`.
    ///
    /// Net is derived by subtraction so `commission + net == gross` holds
    /// exactly.
    #[must_use]
    pub fn compute(gross_amount: Decimal, commission_rate: Decimal) -> Self {
        let commission_amount = (gross_amount * commission_rate).round_dp_with_strategy(
            constants::AMOUNT_SCALE,
            RoundingStrategy::MidpointAwayFromZero,
        );
        Self {
            gross_amount,
            commission_rate,
            commission_amount,
            net_amount: gross_amount - commission_amount,
        }
    }
}

/// The binding agreement between the request owner and the winning offeror.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deal {
    pub id: DealId,
    pub request_id: RequestId,
    pub offer_id: OfferId,
    /// `[request owner, offeror]`.
    pub parties: Vec<UserId>,
    pub gross_amount: Decimal,
    /// Commission rate snapshotted at formation time.
    pub commission_rate: Decimal,
    pub commission_policy_version: u32,
    pub commission_amount: Decimal,
    pub net_amount: Decimal,
    /// Spendable remainder. Starts at `net_amount`, decremented by
    /// approved withdrawals and restored by upheld disputes.
    pub balance: Decimal,
    pub status: DealStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Deal {
    /// Materialize a deal for an accepted offer under `policy`.
    #[must_use]
    pub fn form(
        request_id: RequestId,
        offer_id: OfferId,
        owner: UserId,
        offeror: UserId,
        gross_amount: Decimal,
        policy: &CommissionPolicy,
    ) -> Self {
        let settlement = Settlement::compute(gross_amount, policy.rate);
        let now = Utc::now();
        Self {
            id: DealId::new(),
            request_id,
            offer_id,
            parties: vec![owner, offeror],
            gross_amount: settlement.gross_amount,
            commission_rate: settlement.commission_rate,
            commission_policy_version: policy.version,
            commission_amount: settlement.commission_amount,
            net_amount: settlement.net_amount,
            balance: settlement.net_amount,
            status: DealStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    #[must_use]
    pub fn is_party(&self, user: UserId) -> bool {
        self.parties.contains(&user)
    }

    /// # Errors
    /// Returns `DealNotActive` unless the deal is `active`.
    pub fn ensure_active(&self) -> Result<()> {
        if self.status == DealStatus::Active {
            Ok(())
        } else {
            Err(DealbookError::DealNotActive {
                id: self.id,
                status: self.status,
            })
        }
    }

    /// # Errors
    /// Returns `InsufficientBalance` if `amount` exceeds the balance.
    pub fn ensure_covers(&self, amount: Decimal) -> Result<()> {
        if amount > self.balance {
            return Err(DealbookError::InsufficientBalance {
                needed: amount,
                available: self.balance,
            });
        }
        Ok(())
    }

    /// Take `amount` out of the balance.
    ///
    /// # Errors
    /// Returns `InsufficientBalance` (balance unchanged) if not covered.
    pub fn debit(&mut self, amount: Decimal) -> Result<()> {
        self.ensure_covers(amount)?;
        self.balance -= amount;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Return `amount` to the balance.
    ///
    /// # Errors
    /// Returns `InvariantViolation` if the balance would exceed the net amount.
    pub fn credit(&mut self, amount: Decimal) -> Result<()> {
        let restored = self.balance + amount;
        if restored > self.net_amount {
            return Err(DealbookError::InvariantViolation {
                reason: format!(
                    "{}: restoring {amount} would lift balance to {restored} above net {}",
                    self.id, self.net_amount
                ),
            });
        }
        self.balance = restored;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Check the formation arithmetic and balance bounds.
    ///
    /// # Errors
    /// Returns `InvariantViolation` describing the broken relation.
    pub fn check_figures(&self) -> Result<()> {
        if self.commission_amount + self.net_amount != self.gross_amount {
            return Err(DealbookError::InvariantViolation {
                reason: format!(
                    "{}: commission {} + net {} != gross {}",
                    self.id, self.commission_amount, self.net_amount, self.gross_amount
                ),
            });
        }
        if self.balance.is_sign_negative() || self.balance > self.net_amount {
            return Err(DealbookError::InvariantViolation {
                reason: format!(
                    "{}: balance {} outside [0, {}]",
                    self.id, self.balance, self.net_amount
                ),
            });
        }
        Ok(())
    }
}
