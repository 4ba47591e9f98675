//! # dealbook-types
//!
//! Shared types, errors, and configuration for the **Dealbook** marketplace
//! core.
//!
//! This crate is the leaf dependency of the workspace: every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`RequestId`], [`OfferId`], [`DealId`], [`WithdrawalId`], [`DisputeId`], [`UserId`], [`BusinessId`], [`EntityRef`]
//! - **Request model**: [`Request`], [`RequestKind`], [`SupplyKind`], [`RequestStatus`]
//! - **Offer model**: [`Offer`], [`OfferTerms`], [`OfferType`], [`OfferStatus`]
//! - **Deal model**: [`Deal`], [`DealStatus`], [`Settlement`]
//! - **Withdrawal model**: [`Withdrawal`], [`WithdrawalStatus`]
//! - **Dispute model**: [`Dispute`], [`DisputeTarget`], [`DisputeStatus`], [`DisputeOutcome`]
//! - **Events**: [`MarketEvent`]
//! - **Authorization vocabulary**: [`Action`], [`Role`]
//! - **Configuration**: [`MarketplaceConfig`], [`CommissionPolicy`]
//! - **Errors**: [`DealbookError`] with `DB_ERR_` prefix codes
//! - **Constants**: system-wide limits and defaults

pub mod config;
pub mod constants;
pub mod deal;
pub mod dispute;
pub mod error;
pub mod event;
pub mod ids;
pub mod offer;
pub mod policy;
pub mod request;
pub mod withdrawal;

pub use config::*;
pub use deal::*;
pub use dispute::*;
pub use error::*;
pub use event::*;
pub use ids::*;
pub use offer::*;
pub use policy::*;
pub use request::*;
pub use withdrawal::*;

// Constants are accessed via `dealbook_types::constants::FOO`
// (not re-exported to avoid name collisions).
