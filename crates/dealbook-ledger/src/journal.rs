//! Append-only, hash-chained journal of committed events.
//!
//! Each entry commits to its predecessor:
//! ```text
//! hash_n = SHA-256("dealbook:journal:v1:" || seq_n || hash_{n-1} || recorded_at_n || json(event_n))
//! ```
//! Rewriting or dropping any historical entry breaks every hash after it,
//! which [`Journal::verify`] detects.

use chrono::{DateTime, Utc};
use dealbook_types::{DealbookError, EntityRef, MarketEvent, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Hash that precedes the first entry.
pub const GENESIS_HASH: [u8; 32] = [0u8; 32];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// 1-based position in the journal.
    pub seq: u64,
    pub event: MarketEvent,
    pub recorded_at: DateTime<Utc>,
    pub prev_hash: [u8; 32],
    pub hash: [u8; 32],
}

impl JournalEntry {
    #[must_use]
    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash)
    }
}

fn entry_hash(
    seq: u64,
    prev_hash: &[u8; 32],
    recorded_at: &DateTime<Utc>,
    event: &MarketEvent,
) -> Result<[u8; 32]> {
    let mut hasher = Sha256::new();
    hasher.update(b"dealbook:journal:v1:");
    hasher.update(seq.to_le_bytes());
    hasher.update(prev_hash);
    hasher.update(recorded_at.to_rfc3339().as_bytes());
    hasher.update(serde_json::to_vec(event)?);
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    Ok(out)
}

#[derive(Debug, Default)]
pub struct Journal {
    entries: Vec<JournalEntry>,
}

impl Journal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Hash of the latest entry, or [`GENESIS_HASH`] when empty.
    #[must_use]
    pub fn head(&self) -> [u8; 32] {
        self.entries.last().map_or(GENESIS_HASH, |e| e.hash)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Compute the entries for `events` without appending them.
    ///
    /// Split from [`Journal::extend`] so a commit can fail on hashing
    /// before any table is touched.
    pub fn prepare(&self, events: &[MarketEvent]) -> Result<Vec<JournalEntry>> {
        let mut prev = self.head();
        let mut seq = self.entries.len() as u64;
        let recorded_at = Utc::now();
        let mut prepared = Vec::with_capacity(events.len());
        for event in events {
            seq += 1;
            let hash = entry_hash(seq, &prev, &recorded_at, event)?;
            prepared.push(JournalEntry {
                seq,
                event: event.clone(),
                recorded_at,
                prev_hash: prev,
                hash,
            });
            prev = hash;
        }
        Ok(prepared)
    }

    /// Append entries produced by [`Journal::prepare`] against the current head.
    pub fn extend(&mut self, prepared: Vec<JournalEntry>) {
        self.entries.extend(prepared);
    }

    /// Prepare and append in one step.
    pub fn append(&mut self, events: &[MarketEvent]) -> Result<u64> {
        let prepared = self.prepare(events)?;
        self.extend(prepared);
        Ok(self.entries.len() as u64)
    }

    #[must_use]
    pub fn entries(&self) -> &[JournalEntry] {
        &self.entries
    }

    /// Entries whose event is about `subject`.
    #[must_use]
    pub fn entries_for(&self, subject: EntityRef) -> Vec<&JournalEntry> {
        self.entries
            .iter()
            .filter(|e| e.event.subject() == subject)
            .collect()
    }

    /// Re-derive the whole chain.
    ///
    /// # Errors
    /// Returns `InvariantViolation` naming the first entry that does not
    /// link to its predecessor or whose hash does not match its content.
    pub fn verify(&self) -> Result<()> {
        let mut prev = GENESIS_HASH;
        for (i, entry) in self.entries.iter().enumerate() {
            let expected_seq = i as u64 + 1;
            if entry.seq != expected_seq || entry.prev_hash != prev {
                return Err(DealbookError::InvariantViolation {
                    reason: format!("journal entry {expected_seq} is not linked to its predecessor"),
                });
            }
            let recomputed = entry_hash(entry.seq, &entry.prev_hash, &entry.recorded_at, &entry.event)?;
            if recomputed != entry.hash {
                return Err(DealbookError::InvariantViolation {
                    reason: format!(
                        "journal entry {} hash mismatch: stored {}, recomputed {}",
                        entry.seq,
                        entry.hash_hex(),
                        hex::encode(recomputed)
                    ),
                });
            }
            prev = entry.hash;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dealbook_types::{DealId, RequestId, UserId};

    fn created() -> MarketEvent {
        MarketEvent::RequestCreated {
            request_id: RequestId::new(),
            owner_id: UserId::new(),
        }
    }

    #[test]
    fn empty_journal_head_is_genesis() {
        let j = Journal::new();
        assert_eq!(j.head(), GENESIS_HASH);
        assert!(j.is_empty());
        assert!(j.verify().is_ok());
    }

    #[test]
    fn entries_chain_together() {
        let mut j = Journal::new();
        j.append(&[created(), created()]).unwrap();
        j.append(&[created()]).unwrap();
        assert_eq!(j.len(), 3);
        let entries = j.entries();
        assert_eq!(entries[0].prev_hash, GENESIS_HASH);
        assert_eq!(entries[1].prev_hash, entries[0].hash);
        assert_eq!(entries[2].prev_hash, entries[1].hash);
        assert_eq!(j.head(), entries[2].hash);
        assert!(j.verify().is_ok());
    }

    #[test]
    fn tampering_is_detected() {
        let mut j = Journal::new();
        j.append(&[created(), created(), created()]).unwrap();
        j.entries[1].event = MarketEvent::DealCompleted {
            deal_id: DealId::new(),
        };
        let err = j.verify().unwrap_err();
        assert!(matches!(err, DealbookError::InvariantViolation { .. }));
    }

    #[test]
    fn dropped_entry_is_detected() {
        let mut j = Journal::new();
        j.append(&[created(), created(), created()]).unwrap();
        j.entries.remove(1);
        assert!(j.verify().is_err());
    }

    #[test]
    fn prepare_does_not_append() {
        let j = Journal::new();
        let prepared = j.prepare(&[created()]).unwrap();
        assert_eq!(prepared.len(), 1);
        assert!(j.is_empty());
    }

    #[test]
    fn entries_for_filters_by_subject() {
        let mut j = Journal::new();
        let deal_id = DealId::new();
        j.append(&[created(), MarketEvent::DealCompleted { deal_id }])
            .unwrap();
        assert_eq!(j.entries_for(EntityRef::Deal(deal_id)).len(), 1);
    }
}
