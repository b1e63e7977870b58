use crate::error::{SuretyError, SuretyResult};
use crate::events::SuretyEvent;
use crate::types::BlockContext;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Hash-chained record of one committed event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub index: u64,
    pub block_number: u64,
    pub timestamp: DateTime<Utc>,
    pub kind: String,
    pub payload: Value,
    pub previous_hash: Option<String>,
    pub entry_hash: String,
}

impl JournalEntry {
    /// Decode the payload back into the event it records.
    pub fn event(&self) -> SuretyResult<SuretyEvent> {
        serde_json::from_value(self.payload.clone())
            .map_err(|e| SuretyError::Journal(format!("entry {}: {}", self.index, e)))
    }
}

/// Append-only event journal with hash-chain proofs.
///
/// Entries are only ever added through [`stage`](Self::stage) and
/// [`commit`](Self::commit); nothing is edited in place.
#[derive(Debug, Default, Clone)]
pub struct EventJournal {
    entries: Vec<JournalEntry>,
}

impl EventJournal {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Rebuild a journal from persisted entries and verify hash-chain integrity.
    pub fn from_entries(entries: Vec<JournalEntry>) -> SuretyResult<Self> {
        let journal = Self { entries };

        for (expected_index, entry) in journal.entries.iter().enumerate() {
            if entry.index != expected_index as u64 {
                return Err(SuretyError::Journal(format!(
                    "index gap detected at position {} (found {})",
                    expected_index, entry.index
                )));
            }
        }

        if !journal.verify_chain() {
            return Err(SuretyError::Journal(
                "hash-chain verification failed".to_string(),
            ));
        }

        Ok(journal)
    }

    pub fn entries(&self) -> &[JournalEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn head_hash(&self) -> Option<&str> {
        self.entries.last().map(|entry| entry.entry_hash.as_str())
    }

    pub fn verify_chain(&self) -> bool {
        let mut previous_hash: Option<String> = None;
        for entry in &self.entries {
            let expected_hash = compute_entry_hash(
                entry.index,
                entry.block_number,
                entry.timestamp,
                &entry.kind,
                &entry.payload,
                previous_hash.as_deref(),
            );
            if entry.entry_hash != expected_hash {
                return false;
            }
            if entry.previous_hash != previous_hash {
                return false;
            }
            previous_hash = Some(entry.entry_hash.clone());
        }
        true
    }

    /// Build the chained entries for `events` without mutating the journal.
    pub fn stage(&self, block: &BlockContext, events: &[SuretyEvent]) -> SuretyResult<Vec<JournalEntry>> {
        let mut previous_hash = self.head_hash().map(str::to_string);
        let mut index = self.entries.len() as u64;
        let mut staged = Vec::with_capacity(events.len());

        for event in events {
            let payload = serde_json::to_value(event)
                .map_err(|e| SuretyError::Journal(e.to_string()))?;
            let kind = event.name().to_string();
            let entry_hash = compute_entry_hash(
                index,
                block.number,
                block.timestamp,
                &kind,
                &payload,
                previous_hash.as_deref(),
            );
            staged.push(JournalEntry {
                index,
                block_number: block.number,
                timestamp: block.timestamp,
                kind,
                payload,
                previous_hash: previous_hash.clone(),
                entry_hash: entry_hash.clone(),
            });
            previous_hash = Some(entry_hash);
            index += 1;
        }

        Ok(staged)
    }

    /// Append staged entries after checking they extend the current head.
    pub fn commit(&mut self, staged: Vec<JournalEntry>) -> SuretyResult<()> {
        let mut expected_index = self.entries.len() as u64;
        let mut expected_previous = self.head_hash().map(str::to_string);

        for entry in &staged {
            if entry.index != expected_index {
                return Err(SuretyError::Journal(format!(
                    "commit index mismatch: expected {}, got {}",
                    expected_index, entry.index
                )));
            }
            if entry.previous_hash != expected_previous {
                return Err(SuretyError::Journal(
                    "commit previous hash mismatch".to_string(),
                ));
            }
            let expected_hash = compute_entry_hash(
                entry.index,
                entry.block_number,
                entry.timestamp,
                &entry.kind,
                &entry.payload,
                entry.previous_hash.as_deref(),
            );
            if entry.entry_hash != expected_hash {
                return Err(SuretyError::Journal(
                    "commit hash mismatch for journal entry".to_string(),
                ));
            }
            expected_index += 1;
            expected_previous = Some(entry.entry_hash.clone());
        }

        self.entries.extend(staged);
        Ok(())
    }
}

fn compute_entry_hash(
    index: u64,
    block_number: u64,
    timestamp: DateTime<Utc>,
    kind: &str,
    payload: &Value,
    previous_hash: Option<&str>,
) -> String {
    let material = serde_json::json!({
        "index": index,
        "block_number": block_number,
        "timestamp": timestamp,
        "kind": kind,
        "payload": payload,
        "previous_hash": previous_hash,
    });

    let bytes = serde_json::to_vec(&material).unwrap_or_default();
    blake3::hash(&bytes).to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AccountId;

    fn sample_events() -> Vec<SuretyEvent> {
        vec![
            SuretyEvent::OperatingStatusChanged { operational: false },
            SuretyEvent::CallerAuthorized {
                account: AccountId::new("app"),
            },
        ]
    }

    #[test]
    fn verifies_hash_chain() {
        let mut journal = EventJournal::new();
        let block = BlockContext::seeded(1, 1_700_000_000, 1);
        let staged = journal.stage(&block, &sample_events()).unwrap();
        journal.commit(staged).unwrap();

        let next = BlockContext::seeded(2, 1_700_000_012, 2);
        let staged = journal.stage(&next, &sample_events()[..1]).unwrap();
        journal.commit(staged).unwrap();

        assert_eq!(journal.len(), 3);
        assert!(journal.verify_chain());
        assert_eq!(journal.entries()[2].event().unwrap(), sample_events()[0]);
    }

    #[test]
    fn detects_tampered_entries() {
        let mut journal = EventJournal::new();
        let block = BlockContext::seeded(1, 1_700_000_000, 1);
        let staged = journal.stage(&block, &sample_events()).unwrap();
        journal.commit(staged).unwrap();

        // Clone and tamper outside of append APIs to validate proof behavior.
        let mut tampered = journal.clone();
        tampered.entries[0].payload = serde_json::json!({"tampered": true});

        assert!(!tampered.verify_chain());
        assert!(EventJournal::from_entries(tampered.entries.clone()).is_err());
        assert!(EventJournal::from_entries(journal.entries.clone()).is_ok());
    }

    #[test]
    fn stale_staged_entries_are_refused() {
        let mut journal = EventJournal::new();
        let block = BlockContext::seeded(1, 1_700_000_000, 1);
        let stale = journal.stage(&block, &sample_events()).unwrap();
        let fresh = journal.stage(&block, &sample_events()).unwrap();
        journal.commit(fresh).unwrap();

        let err = journal.commit(stale).unwrap_err();
        assert!(matches!(err, SuretyError::Journal(_)));
        assert_eq!(journal.len(), 2);
    }
}
