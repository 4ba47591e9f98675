//! In-process [`LedgerStore`] backed by hash maps under one lock.
//!
//! ## Commit algorithm
//!
//! ```text
//!  1. take the write lock
//!  2. check every guard against the committed version
//!  3. stage writes into an overlay (inserts at v1, updates at expected+1,
//!     bulk offer rejection evaluated against the overlay)
//!  4. check invariants for every touched request, deal and withdrawal
//!     on the overlay-over-committed view
//!  5. hash the journal entries
//!  6. apply overlay + journal, release the lock
//! ```
//!
//! Steps 2-5 may fail; nothing is applied until all of them succeed.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};

use dealbook_types::{
    Deal, DealId, DealbookError, Dispute, DisputeId, EntityRef, MarketEvent, Offer, OfferId,
    Request, RequestId, Result, Withdrawal, WithdrawalId,
};
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::invariants::{self, LedgerView};
use crate::journal::{Journal, JournalEntry};
use crate::store::{CommitReceipt, Guard, LedgerStore, Versioned, Write, WriteSet};

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Tables {
    requests: HashMap<RequestId, Versioned<Request>>,
    offers: HashMap<OfferId, Versioned<Offer>>,
    offers_by_request: HashMap<RequestId, Vec<OfferId>>,
    deals: HashMap<DealId, Versioned<Deal>>,
    deal_by_offer: HashMap<OfferId, DealId>,
    withdrawals: HashMap<WithdrawalId, Versioned<Withdrawal>>,
    withdrawals_by_deal: HashMap<DealId, Vec<WithdrawalId>>,
    disputes: HashMap<DisputeId, Versioned<Dispute>>,
    disputes_by_withdrawal: HashMap<WithdrawalId, Vec<DisputeId>>,
    journal: Journal,
}

/// Pending changes of one commit, layered over [`Tables`].
#[derive(Debug, Default)]
struct Overlay {
    requests: HashMap<RequestId, Versioned<Request>>,
    offers: HashMap<OfferId, Versioned<Offer>>,
    new_offers: HashMap<RequestId, Vec<OfferId>>,
    deals: HashMap<DealId, Versioned<Deal>>,
    new_deal_by_offer: HashMap<OfferId, DealId>,
    withdrawals: HashMap<WithdrawalId, Versioned<Withdrawal>>,
    new_withdrawals: HashMap<DealId, Vec<WithdrawalId>>,
    disputes: HashMap<DisputeId, Versioned<Dispute>>,
    new_disputes: HashMap<WithdrawalId, Vec<DisputeId>>,

    touched_requests: BTreeSet<RequestId>,
    touched_deals: BTreeSet<DealId>,
    touched_withdrawals: BTreeSet<WithdrawalId>,

    rejected_offers: Vec<OfferId>,
    generated: Vec<MarketEvent>,
}

fn stage_insert<K, T>(
    committed: &HashMap<K, Versioned<T>>,
    staged: &mut HashMap<K, Versioned<T>>,
    id: K,
    row: T,
) -> Result<()>
where
    K: Copy + Eq + Hash + fmt::Display,
{
    if committed.contains_key(&id) || staged.contains_key(&id) {
        return Err(DealbookError::Internal(format!("{id} inserted twice")));
    }
    staged.insert(id, Versioned::new(row));
    Ok(())
}

fn stage_update<K, T>(
    committed: &HashMap<K, Versioned<T>>,
    staged: &mut HashMap<K, Versioned<T>>,
    id: K,
    expected: u64,
    row: T,
) -> Result<()>
where
    K: Copy + Eq + Hash + fmt::Display,
{
    if staged.contains_key(&id) {
        return Err(DealbookError::Internal(format!(
            "{id} written twice in one commit"
        )));
    }
    let current = committed
        .get(&id)
        .map(|v| v.version)
        .ok_or_else(|| DealbookError::VersionConflict {
            entity: format!("{id} (not stored)"),
        })?;
    if current != expected {
        return Err(DealbookError::VersionConflict {
            entity: format!("{id} (expected v{expected}, found v{current})"),
        });
    }
    staged.insert(
        id,
        Versioned {
            version: expected + 1,
            row,
        },
    );
    Ok(())
}

fn check_version(found: Option<u64>, expected: u64, what: &dyn fmt::Display) -> Result<()> {
    match found {
        Some(v) if v == expected => Ok(()),
        Some(v) => Err(DealbookError::VersionConflict {
            entity: format!("{what} (expected v{expected}, found v{v})"),
        }),
        None => Err(DealbookError::VersionConflict {
            entity: format!("{what} (not stored)"),
        }),
    }
}

/// Committed tables seen through a pending overlay.
struct View<'a> {
    tables: &'a Tables,
    overlay: &'a Overlay,
}

fn ids_of<'a, K, V>(committed: &'a HashMap<K, Vec<V>>, staged: &'a HashMap<K, Vec<V>>, key: &K) -> impl Iterator<Item = &'a V>
where
    K: Eq + Hash,
{
    committed
        .get(key)
        .into_iter()
        .flatten()
        .chain(staged.get(key).into_iter().flatten())
}

impl LedgerView for View<'_> {
    fn request(&self, id: RequestId) -> Option<&Request> {
        self.overlay
            .requests
            .get(&id)
            .or_else(|| self.tables.requests.get(&id))
            .map(|v| &v.row)
    }

    fn offer(&self, id: OfferId) -> Option<&Offer> {
        self.overlay
            .offers
            .get(&id)
            .or_else(|| self.tables.offers.get(&id))
            .map(|v| &v.row)
    }

    fn offers_of(&self, id: RequestId) -> Vec<&Offer> {
        ids_of(&self.tables.offers_by_request, &self.overlay.new_offers, &id)
            .filter_map(|oid| self.offer(*oid))
            .collect()
    }

    fn deal(&self, id: DealId) -> Option<&Deal> {
        self.overlay
            .deals
            .get(&id)
            .or_else(|| self.tables.deals.get(&id))
            .map(|v| &v.row)
    }

    fn deal_for_offer(&self, id: OfferId) -> Option<&Deal> {
        self.overlay
            .new_deal_by_offer
            .get(&id)
            .or_else(|| self.tables.deal_by_offer.get(&id))
            .and_then(|did| self.deal(*did))
    }

    fn withdrawal(&self, id: WithdrawalId) -> Option<&Withdrawal> {
        self.overlay
            .withdrawals
            .get(&id)
            .or_else(|| self.tables.withdrawals.get(&id))
            .map(|v| &v.row)
    }

    fn withdrawals_of(&self, id: DealId) -> Vec<&Withdrawal> {
        ids_of(&self.tables.withdrawals_by_deal, &self.overlay.new_withdrawals, &id)
            .filter_map(|wid| self.withdrawal(*wid))
            .collect()
    }

    fn disputes_of(&self, id: WithdrawalId) -> Vec<&Dispute> {
        ids_of(&self.tables.disputes_by_withdrawal, &self.overlay.new_disputes, &id)
            .filter_map(|did| {
                self.overlay
                    .disputes
                    .get(did)
                    .or_else(|| self.tables.disputes.get(did))
                    .map(|v| &v.row)
            })
            .collect()
    }
}

/// Committed tables alone, for audits.
struct Committed<'a>(&'a Tables);

impl LedgerView for Committed<'_> {
    fn request(&self, id: RequestId) -> Option<&Request> {
        self.0.requests.get(&id).map(|v| &v.row)
    }
    fn offer(&self, id: OfferId) -> Option<&Offer> {
        self.0.offers.get(&id).map(|v| &v.row)
    }
    fn offers_of(&self, id: RequestId) -> Vec<&Offer> {
        self.0
            .offers_by_request
            .get(&id)
            .into_iter()
            .flatten()
            .filter_map(|oid| self.offer(*oid))
            .collect()
    }
    fn deal(&self, id: DealId) -> Option<&Deal> {
        self.0.deals.get(&id).map(|v| &v.row)
    }
    fn deal_for_offer(&self, id: OfferId) -> Option<&Deal> {
        self.0.deal_by_offer.get(&id).and_then(|did| self.deal(*did))
    }
    fn withdrawal(&self, id: WithdrawalId) -> Option<&Withdrawal> {
        self.0.withdrawals.get(&id).map(|v| &v.row)
    }
    fn withdrawals_of(&self, id: DealId) -> Vec<&Withdrawal> {
        self.0
            .withdrawals_by_deal
            .get(&id)
            .into_iter()
            .flatten()
            .filter_map(|wid| self.withdrawal(*wid))
            .collect()
    }
    fn disputes_of(&self, id: WithdrawalId) -> Vec<&Dispute> {
        self.0
            .disputes_by_withdrawal
            .get(&id)
            .into_iter()
            .flatten()
            .filter_map(|did| self.0.disputes.get(did).map(|v| &v.row))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// InMemoryLedger
// ---------------------------------------------------------------------------

/// Thread-safe in-memory ledger.
///
/// Readers share the lock; a commit holds it exclusively for the whole
/// check-and-apply, so a write set either lands against exactly the
/// versions it was built from or fails with `VersionConflict`.
#[derive(Debug)]
pub struct InMemoryLedger {
    tables: RwLock<Tables>,
    available: AtomicBool,
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryLedger {
    #[must_use]
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            available: AtomicBool::new(true),
        }
    }

    fn ensure_available(&self) -> Result<()> {
        if self.available.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(DealbookError::StorageUnavailable(
                "in-memory ledger is offline".to_string(),
            ))
        }
    }

    /// Number of journaled events.
    #[must_use]
    pub fn journal_len(&self) -> usize {
        self.tables.read().journal.len()
    }

    /// Hex-encoded journal head.
    #[must_use]
    pub fn journal_head_hex(&self) -> String {
        hex::encode(self.tables.read().journal.head())
    }

    /// Snapshot of every journal entry.
    #[must_use]
    pub fn journal_entries(&self) -> Vec<JournalEntry> {
        self.tables.read().journal.entries().to_vec()
    }

    /// Journal entries about one entity.
    #[must_use]
    pub fn history_of(&self, subject: EntityRef) -> Vec<JournalEntry> {
        self.tables
            .read()
            .journal
            .entries_for(subject)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Re-derive the journal hash chain.
    ///
    /// # Errors
    /// Returns `InvariantViolation` at the first broken link.
    pub fn verify_journal(&self) -> Result<()> {
        self.tables.read().journal.verify()
    }

    /// Check every invariant over the whole committed state.
    ///
    /// # Errors
    /// Returns the first `InvariantViolation` found.
    pub fn audit(&self) -> Result<()> {
        let tables = self.tables.read();
        let view = Committed(&tables);
        for id in tables.requests.keys() {
            invariants::check_request(&view, *id)?;
        }
        for id in tables.deals.keys() {
            invariants::check_deal(&view, *id)?;
        }
        for id in tables.withdrawals.keys() {
            invariants::check_disputes(&view, *id)?;
        }
        tables.journal.verify()
    }

    /// Simulate the backing store going away or coming back.
    #[cfg(any(test, feature = "test-helpers"))]
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Release);
    }

    fn check_guards(tables: &Tables, guards: &[Guard]) -> Result<()> {
        for guard in guards {
            match *guard {
                Guard::Request { id, version } => {
                    check_version(tables.requests.get(&id).map(|v| v.version), version, &id)?;
                }
                Guard::Offer { id, version } => {
                    check_version(tables.offers.get(&id).map(|v| v.version), version, &id)?;
                }
                Guard::Deal { id, version } => {
                    check_version(tables.deals.get(&id).map(|v| v.version), version, &id)?;
                }
                Guard::Withdrawal { id, version } => {
                    check_version(tables.withdrawals.get(&id).map(|v| v.version), version, &id)?;
                }
            }
        }
        Ok(())
    }

    fn stage(tables: &Tables, writes: Vec<Write>) -> Result<Overlay> {
        let mut o = Overlay::default();
        for write in writes {
            match write {
                Write::InsertRequest(row) => {
                    let id = row.id;
                    stage_insert(&tables.requests, &mut o.requests, id, row)?;
                    o.touched_requests.insert(id);
                }
                Write::UpdateRequest { expected, row } => {
                    let id = row.id;
                    stage_update(&tables.requests, &mut o.requests, id, expected, row)?;
                    o.touched_requests.insert(id);
                }
                Write::InsertOffer(row) => {
                    let (id, request_id) = (row.id, row.request_id);
                    stage_insert(&tables.offers, &mut o.offers, id, row)?;
                    o.new_offers.entry(request_id).or_default().push(id);
                    o.touched_requests.insert(request_id);
                }
                Write::UpdateOffer { expected, row } => {
                    let request_id = row.request_id;
                    stage_update(&tables.offers, &mut o.offers, row.id, expected, row)?;
                    o.touched_requests.insert(request_id);
                }
                Write::RejectPendingOffers {
                    request_id,
                    except,
                    reason,
                } => {
                    Self::stage_bulk_reject(tables, &mut o, request_id, except, &reason)?;
                }
                Write::InsertDeal(row) => {
                    let (id, offer_id) = (row.id, row.offer_id);
                    let taken = tables.deal_by_offer.contains_key(&offer_id)
                        || o.new_deal_by_offer.contains_key(&offer_id);
                    if taken {
                        return Err(DealbookError::InvariantViolation {
                            reason: format!("{offer_id} already has a deal"),
                        });
                    }
                    o.touched_requests.insert(row.request_id);
                    stage_insert(&tables.deals, &mut o.deals, id, row)?;
                    o.new_deal_by_offer.insert(offer_id, id);
                    o.touched_deals.insert(id);
                }
                Write::UpdateDeal { expected, row } => {
                    let id = row.id;
                    o.touched_requests.insert(row.request_id);
                    stage_update(&tables.deals, &mut o.deals, id, expected, row)?;
                    o.touched_deals.insert(id);
                }
                Write::InsertWithdrawal(row) => {
                    let (id, deal_id) = (row.id, row.deal_id);
                    stage_insert(&tables.withdrawals, &mut o.withdrawals, id, row)?;
                    o.new_withdrawals.entry(deal_id).or_default().push(id);
                    o.touched_deals.insert(deal_id);
                    o.touched_withdrawals.insert(id);
                }
                Write::UpdateWithdrawal { expected, row } => {
                    let (id, deal_id) = (row.id, row.deal_id);
                    stage_update(&tables.withdrawals, &mut o.withdrawals, id, expected, row)?;
                    o.touched_deals.insert(deal_id);
                    o.touched_withdrawals.insert(id);
                }
                Write::InsertDispute(row) => {
                    let (id, wid, deal_id) = (row.id, row.target.withdrawal_id(), row.deal_id);
                    stage_insert(&tables.disputes, &mut o.disputes, id, row)?;
                    o.new_disputes.entry(wid).or_default().push(id);
                    o.touched_withdrawals.insert(wid);
                    o.touched_deals.insert(deal_id);
                }
                Write::UpdateDispute { expected, row } => {
                    let (id, wid) = (row.id, row.target.withdrawal_id());
                    stage_update(&tables.disputes, &mut o.disputes, id, expected, row)?;
                    o.touched_withdrawals.insert(wid);
                }
            }
        }
        Ok(o)
    }

    /// Reject the request's pending offers other than `except`.
    ///
    /// Offers already written earlier in the same set are amended in place
    /// so their staged version stays at committed + 1.
    fn stage_bulk_reject(
        tables: &Tables,
        o: &mut Overlay,
        request_id: RequestId,
        except: Option<OfferId>,
        reason: &str,
    ) -> Result<()> {
        let ids: Vec<OfferId> = ids_of(&tables.offers_by_request, &o.new_offers, &request_id)
            .copied()
            .filter(|id| Some(*id) != except)
            .collect();

        for id in ids {
            if let Some(staged) = o.offers.get_mut(&id) {
                if staged.row.is_pending() {
                    staged.row.mark_rejected(reason)?;
                } else {
                    continue;
                }
            } else if let Some(current) = tables.offers.get(&id) {
                if !current.row.is_pending() {
                    continue;
                }
                let mut row = current.row.clone();
                row.mark_rejected(reason)?;
                o.offers.insert(
                    id,
                    Versioned {
                        version: current.version + 1,
                        row,
                    },
                );
            } else {
                continue;
            }
            o.rejected_offers.push(id);
            o.generated.push(MarketEvent::OfferRejected {
                offer_id: id,
                request_id,
                reason: reason.to_string(),
            });
        }
        o.touched_requests.insert(request_id);
        Ok(())
    }

    fn check_invariants(tables: &Tables, overlay: &Overlay) -> Result<()> {
        let view = View { tables, overlay };
        for id in &overlay.touched_requests {
            invariants::check_request(&view, *id)?;
        }
        for id in &overlay.touched_deals {
            invariants::check_deal(&view, *id)?;
        }
        for id in &overlay.touched_withdrawals {
            invariants::check_disputes(&view, *id)?;
        }
        Ok(())
    }

    fn apply(tables: &mut Tables, overlay: Overlay, entries: Vec<JournalEntry>) {
        let Overlay {
            requests,
            offers,
            new_offers,
            deals,
            new_deal_by_offer,
            withdrawals,
            new_withdrawals,
            disputes,
            new_disputes,
            ..
        } = overlay;

        tables.requests.extend(requests);
        tables.offers.extend(offers);
        for (rid, ids) in new_offers {
            tables.offers_by_request.entry(rid).or_default().extend(ids);
        }
        tables.deals.extend(deals);
        tables.deal_by_offer.extend(new_deal_by_offer);
        tables.withdrawals.extend(withdrawals);
        for (did, ids) in new_withdrawals {
            tables.withdrawals_by_deal.entry(did).or_default().extend(ids);
        }
        tables.disputes.extend(disputes);
        for (wid, ids) in new_disputes {
            tables.disputes_by_withdrawal.entry(wid).or_default().extend(ids);
        }
        tables.journal.extend(entries);
    }
}

impl LedgerStore for InMemoryLedger {
    fn request(&self, id: RequestId) -> Result<Option<Versioned<Request>>> {
        self.ensure_available()?;
        Ok(self.tables.read().requests.get(&id).cloned())
    }

    fn offer(&self, id: OfferId) -> Result<Option<Versioned<Offer>>> {
        self.ensure_available()?;
        Ok(self.tables.read().offers.get(&id).cloned())
    }

    fn deal(&self, id: DealId) -> Result<Option<Versioned<Deal>>> {
        self.ensure_available()?;
        Ok(self.tables.read().deals.get(&id).cloned())
    }

    fn withdrawal(&self, id: WithdrawalId) -> Result<Option<Versioned<Withdrawal>>> {
        self.ensure_available()?;
        Ok(self.tables.read().withdrawals.get(&id).cloned())
    }

    fn dispute(&self, id: DisputeId) -> Result<Option<Versioned<Dispute>>> {
        self.ensure_available()?;
        Ok(self.tables.read().disputes.get(&id).cloned())
    }

    fn offers_for_request(&self, id: RequestId) -> Result<Vec<Offer>> {
        self.ensure_available()?;
        let tables = self.tables.read();
        Ok(Committed(&tables)
            .offers_of(id)
            .into_iter()
            .cloned()
            .collect())
    }

    fn deal_for_offer(&self, id: OfferId) -> Result<Option<Versioned<Deal>>> {
        self.ensure_available()?;
        let tables = self.tables.read();
        Ok(tables
            .deal_by_offer
            .get(&id)
            .and_then(|did| tables.deals.get(did))
            .cloned())
    }

    fn withdrawals_for_deal(&self, id: DealId) -> Result<Vec<Withdrawal>> {
        self.ensure_available()?;
        let tables = self.tables.read();
        Ok(Committed(&tables)
            .withdrawals_of(id)
            .into_iter()
            .cloned()
            .collect())
    }

    fn disputes_for_withdrawal(&self, id: WithdrawalId) -> Result<Vec<Dispute>> {
        self.ensure_available()?;
        let tables = self.tables.read();
        Ok(Committed(&tables)
            .disputes_of(id)
            .into_iter()
            .cloned()
            .collect())
    }

    fn commit(&self, set: WriteSet) -> Result<CommitReceipt> {
        self.ensure_available()?;
        let WriteSet {
            guards,
            writes,
            mut events,
        } = set;
        let write_count = writes.len();

        let mut tables = self.tables.write();

        let staged = Self::check_guards(&tables, &guards)
            .and_then(|()| Self::stage(&tables, writes))
            .and_then(|overlay| {
                Self::check_invariants(&tables, &overlay)?;
                Ok(overlay)
            });
        let mut overlay = match staged {
            Ok(overlay) => overlay,
            Err(e) => {
                if e.is_retryable() {
                    debug!(error = %e, "Commit lost a version race");
                } else {
                    warn!(code = e.code(), error = %e, "Commit refused");
                }
                return Err(e);
            }
        };

        events.append(&mut overlay.generated);
        let entries = tables.journal.prepare(&events)?;
        let rejected_offers = std::mem::take(&mut overlay.rejected_offers);

        Self::apply(&mut tables, overlay, entries);
        let journal_seq = tables.journal.len() as u64;
        let journal_head = tables.journal.head();
        drop(tables);

        debug!(
            writes = write_count,
            events = events.len(),
            journal_seq,
            rejected = rejected_offers.len(),
            "Committed write set"
        );

        Ok(CommitReceipt {
            journal_seq,
            journal_head,
            rejected_offers,
            events,
        })
    }
}
