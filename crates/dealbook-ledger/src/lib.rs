//! # dealbook-ledger
//!
//! **Ledger Store**: the single shared mutable resource of the marketplace.
//!
//! ## Architecture
//!
//! Every state change arrives as a [`WriteSet`] and is applied atomically by
//! [`LedgerStore::commit`]:
//! 1. Version guards catch stale reads (`VersionConflict`)
//! 2. Row writes are staged over the committed tables
//! 3. Scoped bulk updates run against the staged state
//! 4. Invariants are checked on the post-state
//! 5. Events are appended to a hash-chained [`Journal`]
//!
//! [`InMemoryLedger`] is the bundled store. Other backends implement
//! [`LedgerStore`] with the same all-or-nothing contract.

pub mod invariants;
pub mod journal;
pub mod memory;
pub mod store;

pub use invariants::LedgerView;
pub use journal::{GENESIS_HASH, Journal, JournalEntry};
pub use memory::InMemoryLedger;
pub use store::{CommitReceipt, Guard, LedgerStore, Versioned, Write, WriteSet};
