//! # dealbook-engine
//!
//! **Transition contracts** of the marketplace core, exposed through the
//! [`Marketplace`] facade.
//!
//! ## Architecture
//!
//! ```text
//!   Request ──▶ Offers (N) ──accept──▶ Deal ──▶ Withdrawals (N) ──▶ Disputes
//!                   │                   ▲
//!                   └── siblings rejected in the same commit
//! ```
//!
//! Each contract reads versioned rows from a [`LedgerStore`], consults the
//! [`PolicyGate`], checks its preconditions and commits one atomic write
//! set. Version conflicts are retried against fresh state up to
//! `max_commit_retries`. Committed events are forwarded to the
//! [`NotificationSink`].
//!
//! [`LedgerStore`]: dealbook_ledger::LedgerStore

pub mod deals;
mod disputes;
pub mod marketplace;
mod offers;
pub mod policy;
pub mod ports;
mod requests;
pub mod retry;
pub mod telemetry;
mod withdrawals;

pub use deals::{derive_status, ensure_positive_net, form_deal};
pub use marketplace::Marketplace;
pub use policy::RolePolicy;
pub use ports::{
    AllowAll, Attachment, AttachmentStore, MemoryAttachmentStore, MemorySink, NotificationSink,
    NullSink, PolicyGate, TracingSink, UrlAttachmentStore,
};
pub use retry::with_retries;
pub use telemetry::init_tracing;
