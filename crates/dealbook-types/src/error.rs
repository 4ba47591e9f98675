//! Error types for the Dealbook marketplace core.
//!
//! All errors use the `DB_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Request errors
//! - 2xx: Offer errors
//! - 3xx: Deal errors
//! - 4xx: Withdrawal errors
//! - 5xx: Dispute errors
//! - 8xx: Authorization errors
//! - 9xx: Storage / concurrency / internal errors
//!
//! Every variant except [`DealbookError::StorageUnavailable`] and
//! [`DealbookError::InvariantViolation`] is an expected outcome the caller
//! handles by retrying with fresh state or surfacing it to the user.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::{
    Action, DealId, DealStatus, DisputeId, OfferId, OfferStatus, RequestId, RequestStatus,
    UserId, WithdrawalId, WithdrawalStatus,
};

/// Central error enum for all Dealbook operations.
#[derive(Debug, Error)]
pub enum DealbookError {
    // =================================================================
    // Request Errors (1xx)
    // =================================================================
    /// The requested resource request does not exist.
    #[error("DB_ERR_100: Request not found: {0}")]
    RequestNotFound(RequestId),

    /// The request is not accepting offers.
    #[error("DB_ERR_101: Request {id} is not open (status {status})")]
    RequestNotOpen { id: RequestId, status: RequestStatus },

    /// Another offer already won this request.
    #[error("DB_ERR_102: Request {0} already has an accepted offer")]
    RequestAlreadyResolved(RequestId),

    /// The request failed validation.
    #[error("DB_ERR_103: Invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// The requested status change is not a legal move.
    #[error("DB_ERR_104: Illegal request transition: {from} -> {to}")]
    InvalidRequestTransition {
        from: RequestStatus,
        to: RequestStatus,
    },

    // =================================================================
    // Offer Errors (2xx)
    // =================================================================
    #[error("DB_ERR_200: Offer not found: {0}")]
    OfferNotFound(OfferId),

    /// The offer already left the `pending` state.
    #[error("DB_ERR_201: Offer {id} is not pending (status {status})")]
    OfferNotPending { id: OfferId, status: OfferStatus },

    #[error("DB_ERR_202: Invalid offer: {reason}")]
    InvalidOffer { reason: String },

    // =================================================================
    // Deal Errors (3xx)
    // =================================================================
    #[error("DB_ERR_300: Deal not found: {0}")]
    DealNotFound(DealId),

    #[error("DB_ERR_301: Deal {id} is not active (status {status})")]
    DealNotActive { id: DealId, status: DealStatus },

    // =================================================================
    // Withdrawal Errors (4xx)
    // =================================================================
    #[error("DB_ERR_400: Withdrawal not found: {0}")]
    WithdrawalNotFound(WithdrawalId),

    /// Not enough deal balance to cover the withdrawal.
    #[error("DB_ERR_401: Insufficient deal balance: need {needed}, have {available}")]
    InsufficientBalance { needed: Decimal, available: Decimal },

    /// Approval or rejection attempted on a withdrawal that is past `requested`.
    #[error("DB_ERR_402: Withdrawal {id} is not awaiting approval (status {status})")]
    WithdrawalNotRequested {
        id: WithdrawalId,
        status: WithdrawalStatus,
    },

    /// Proof submission attempted before approval.
    #[error("DB_ERR_403: Withdrawal {id} is not approved (status {status})")]
    WithdrawalNotApproved {
        id: WithdrawalId,
        status: WithdrawalStatus,
    },

    /// Release confirmation attempted before proof was submitted.
    #[error("DB_ERR_404: Withdrawal {id} has no submitted proof (status {status})")]
    ProofNotSubmitted {
        id: WithdrawalId,
        status: WithdrawalStatus,
    },

    #[error("DB_ERR_405: Invalid withdrawal: {reason}")]
    InvalidWithdrawal { reason: String },

    /// The attachment store could not resolve the proof reference.
    #[error("DB_ERR_406: Proof reference cannot be resolved: {url}")]
    ProofNotResolvable { url: String },

    // =================================================================
    // Dispute Errors (5xx)
    // =================================================================
    #[error("DB_ERR_500: Dispute not found: {0}")]
    DisputeNotFound(DisputeId),

    /// An unresolved dispute already targets this withdrawal.
    #[error("DB_ERR_501: Dispute {existing} already open against {target}")]
    DisputeAlreadyOpen {
        target: WithdrawalId,
        existing: DisputeId,
    },

    /// Only `approved` or `proof_submitted` withdrawals may be disputed.
    #[error("DB_ERR_502: Withdrawal {id} cannot be disputed (status {status})")]
    WithdrawalNotDisputable {
        id: WithdrawalId,
        status: WithdrawalStatus,
    },

    #[error("DB_ERR_503: Dispute {0} is no longer open")]
    DisputeNotOpen(DisputeId),

    #[error("DB_ERR_504: Invalid dispute: {reason}")]
    InvalidDispute { reason: String },

    // =================================================================
    // Authorization Errors (8xx)
    // =================================================================
    #[error("DB_ERR_800: {actor} is not authorized to {action}")]
    NotAuthorized { actor: UserId, action: Action },

    // =================================================================
    // Storage / Concurrency / Internal (9xx)
    // =================================================================
    /// A versioned row changed between read and commit. Retried internally.
    #[error("DB_ERR_900: Version conflict on {entity}")]
    VersionConflict { entity: String },

    /// Version conflicts persisted past the retry budget.
    #[error("DB_ERR_901: Concurrency conflict persisted after {attempts} attempts")]
    ConcurrencyConflict { attempts: u32 },

    /// The ledger store itself failed. Unrecoverable for this call.
    #[error("DB_ERR_902: Ledger storage unavailable: {0}")]
    StorageUnavailable(String),

    /// A commit would have broken a ledger invariant. Nothing was applied.
    #[error("DB_ERR_903: Ledger invariant violation: {reason}")]
    InvariantViolation { reason: String },

    #[error("DB_ERR_904: Configuration error: {0}")]
    Configuration(String),

    #[error("DB_ERR_905: Serialization error: {0}")]
    Serialization(String),

    #[error("DB_ERR_906: Internal error: {0}")]
    Internal(String),
}

impl DealbookError {
    /// Whether the failure came from a stale read and the operation should
    /// be re-run against fresh state.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::VersionConflict { .. })
    }

    /// The stable `DB_ERR_nnn` code of this error.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::RequestNotFound(_) => "DB_ERR_100",
            Self::RequestNotOpen { .. } => "DB_ERR_101",
            Self::RequestAlreadyResolved(_) => "DB_ERR_102",
            Self::InvalidRequest { .. } => "DB_ERR_103",
            Self::InvalidRequestTransition { .. } => "DB_ERR_104",
            Self::OfferNotFound(_) => "DB_ERR_200",
            Self::OfferNotPending { .. } => "DB_ERR_201",
            Self::InvalidOffer { .. } => "DB_ERR_202",
            Self::DealNotFound(_) => "DB_ERR_300",
            Self::DealNotActive { .. } => "DB_ERR_301",
            Self::WithdrawalNotFound(_) => "DB_ERR_400",
            Self::InsufficientBalance { .. } => "DB_ERR_401",
            Self::WithdrawalNotRequested { .. } => "DB_ERR_402",
            Self::WithdrawalNotApproved { .. } => "DB_ERR_403",
            Self::ProofNotSubmitted { .. } => "DB_ERR_404",
            Self::InvalidWithdrawal { .. } => "DB_ERR_405",
            Self::ProofNotResolvable { .. } => "DB_ERR_406",
            Self::DisputeNotFound(_) => "DB_ERR_500",
            Self::DisputeAlreadyOpen { .. } => "DB_ERR_501",
            Self::WithdrawalNotDisputable { .. } => "DB_ERR_502",
            Self::DisputeNotOpen(_) => "DB_ERR_503",
            Self::InvalidDispute { .. } => "DB_ERR_504",
            Self::NotAuthorized { .. } => "DB_ERR_800",
            Self::VersionConflict { .. } => "DB_ERR_900",
            Self::ConcurrencyConflict { .. } => "DB_ERR_901",
            Self::StorageUnavailable(_) => "DB_ERR_902",
            Self::InvariantViolation { .. } => "DB_ERR_903",
            Self::Configuration(_) => "DB_ERR_904",
            Self::Serialization(_) => "DB_ERR_905",
            Self::Internal(_) => "DB_ERR_906",
        }
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, DealbookError>;

impl From<serde_json::Error> for DealbookError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
