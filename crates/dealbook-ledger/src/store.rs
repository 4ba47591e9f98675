//! The `LedgerStore` port and its write-set vocabulary.
//!
//! Every mutation reaches the ledger as one [`WriteSet`]: optimistic
//! version guards, row inserts/updates, scoped bulk updates and the
//! domain events the change produces. A store applies a write set
//! atomically or not at all.

use dealbook_types::{
    Deal, DealId, Dispute, DisputeId, MarketEvent, Offer, OfferId, Request, RequestId, Result,
    Withdrawal, WithdrawalId,
};
use serde::{Deserialize, Serialize};

/// A stored row together with its optimistic-concurrency version.
///
/// Versions start at 1 on insert and increase by one on every update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Versioned<T> {
    pub version: u64,
    pub row: T,
}

impl<T> Versioned<T> {
    #[must_use]
    pub fn new(row: T) -> Self {
        Self { version: 1, row }
    }

    #[must_use]
    pub fn into_row(self) -> T {
        self.row
    }
}

/// A read-set check: the row must still be at `version` when the write
/// set commits. Used for rows the operation depends on but does not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    Request { id: RequestId, version: u64 },
    Offer { id: OfferId, version: u64 },
    Deal { id: DealId, version: u64 },
    Withdrawal { id: WithdrawalId, version: u64 },
}

/// A single row mutation.
#[derive(Debug, Clone)]
pub enum Write {
    InsertRequest(Request),
    UpdateRequest { expected: u64, row: Request },
    InsertOffer(Offer),
    UpdateOffer { expected: u64, row: Offer },
    /// Reject every `pending` offer of `request_id` except `except`,
    /// evaluated against the committed state at apply time.
    RejectPendingOffers {
        request_id: RequestId,
        except: Option<OfferId>,
        reason: String,
    },
    InsertDeal(Deal),
    UpdateDeal { expected: u64, row: Deal },
    InsertWithdrawal(Withdrawal),
    UpdateWithdrawal { expected: u64, row: Withdrawal },
    InsertDispute(Dispute),
    UpdateDispute { expected: u64, row: Dispute },
}

/// Everything one transition wants to change, applied all-or-nothing.
#[derive(Debug, Clone, Default)]
pub struct WriteSet {
    pub guards: Vec<Guard>,
    pub writes: Vec<Write>,
    pub events: Vec<MarketEvent>,
}

impl WriteSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn guard(mut self, guard: Guard) -> Self {
        self.guards.push(guard);
        self
    }

    #[must_use]
    pub fn write(mut self, write: Write) -> Self {
        self.writes.push(write);
        self
    }

    #[must_use]
    pub fn event(mut self, event: MarketEvent) -> Self {
        self.events.push(event);
        self
    }

    pub fn push_write(&mut self, write: Write) {
        self.writes.push(write);
    }

    pub fn push_event(&mut self, event: MarketEvent) {
        self.events.push(event);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }
}

/// What a successful commit did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitReceipt {
    /// Journal sequence number of the last event appended by this commit.
    pub journal_seq: u64,
    /// Journal head hash after the commit.
    pub journal_head: [u8; 32],
    /// Offers rejected by a `RejectPendingOffers` write.
    pub rejected_offers: Vec<OfferId>,
    /// Every event the commit journaled, including the generated
    /// `OfferRejected` events, in journal order.
    pub events: Vec<MarketEvent>,
}

/// The sole mutable shared resource of the marketplace core.
///
/// Reads return committed snapshots. Mutations only go through
/// [`LedgerStore::commit`], which is the single choke point where version
/// guards and invariants are enforced.
pub trait LedgerStore: Send + Sync {
    fn request(&self, id: RequestId) -> Result<Option<Versioned<Request>>>;
    fn offer(&self, id: OfferId) -> Result<Option<Versioned<Offer>>>;
    fn deal(&self, id: DealId) -> Result<Option<Versioned<Deal>>>;
    fn withdrawal(&self, id: WithdrawalId) -> Result<Option<Versioned<Withdrawal>>>;
    fn dispute(&self, id: DisputeId) -> Result<Option<Versioned<Dispute>>>;

    /// Offers of a request in submission order.
    fn offers_for_request(&self, id: RequestId) -> Result<Vec<Offer>>;
    fn deal_for_offer(&self, id: OfferId) -> Result<Option<Versioned<Deal>>>;
    /// Withdrawals of a deal in request order.
    fn withdrawals_for_deal(&self, id: DealId) -> Result<Vec<Withdrawal>>;
    /// Disputes raised against a withdrawal, oldest first.
    fn disputes_for_withdrawal(&self, id: WithdrawalId) -> Result<Vec<Dispute>>;

    /// The dispute currently open against a withdrawal, if any.
    fn open_dispute_for(&self, id: WithdrawalId) -> Result<Option<Versioned<Dispute>>> {
        let open = self
            .disputes_for_withdrawal(id)?
            .into_iter()
            .find(Dispute::is_open);
        match open {
            Some(d) => self.dispute(d.id),
            None => Ok(None),
        }
    }

    /// Apply `set` atomically.
    ///
    /// # Errors
    /// - `VersionConflict` if any guarded or updated row moved on
    /// - `InvariantViolation` if the post-state would break an invariant
    /// - `StorageUnavailable` if the store cannot be reached
    fn commit(&self, set: WriteSet) -> Result<CommitReceipt>;
}
