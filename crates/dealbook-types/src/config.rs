//! Configuration types for the marketplace core.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{DealbookError, Result, constants};

/// The platform commission applied when a deal is formed.
///
/// Each deal snapshots both the rate and the version so historical deals
/// stay auditable after the policy changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionPolicy {
    /// Fraction of the gross amount retained by the platform (0.02 = 2%).
    pub rate: Decimal,
    /// Monotonic policy version recorded on each deal.
    pub version: u32,
}

impl CommissionPolicy {
    #[must_use]
    pub fn new(rate: Decimal, version: u32) -> Self {
        Self { rate, version }
    }

    /// # Errors
    /// Returns `Configuration` if the rate is outside `[0, 1)`.
    pub fn validate(&self) -> Result<()> {
        if self.rate.is_sign_negative() || self.rate >= Decimal::ONE {
            return Err(DealbookError::Configuration(format!(
                "commission rate {} outside [0, 1)",
                self.rate
            )));
        }
        Ok(())
    }
}

impl Default for CommissionPolicy {
    fn default() -> Self {
        Self {
            rate: Decimal::new(constants::DEFAULT_COMMISSION_BPS, 4), // 0.0200
            version: constants::DEFAULT_COMMISSION_POLICY_VERSION,
        }
    }
}

/// Top-level configuration for a marketplace instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketplaceConfig {
    pub commission: CommissionPolicy,
    /// Commit attempts before a version conflict is surfaced.
    pub max_commit_retries: u32,
    /// Maximum length of free-text reasons and notes.
    pub max_reason_len: usize,
    /// Refuse proof references the attachment store cannot resolve.
    pub require_resolvable_proof: bool,
}

impl Default for MarketplaceConfig {
    fn default() -> Self {
        Self {
            commission: CommissionPolicy::default(),
            max_commit_retries: constants::DEFAULT_MAX_COMMIT_RETRIES,
            max_reason_len: constants::DEFAULT_MAX_REASON_LEN,
            require_resolvable_proof: true,
        }
    }
}

impl MarketplaceConfig {
    /// Parse a JSON document; missing fields fall back to defaults.
    ///
    /// # Errors
    /// Returns `Serialization` for malformed JSON and `Configuration` for
    /// out-of-range values.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// # Errors
    /// Returns `Configuration` describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        self.commission.validate()?;
        if self.max_commit_retries == 0 {
            return Err(DealbookError::Configuration(
                "max_commit_retries must be at least 1".to_string(),
            ));
        }
        if self.max_reason_len == 0 {
            return Err(DealbookError::Configuration(
                "max_reason_len must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
