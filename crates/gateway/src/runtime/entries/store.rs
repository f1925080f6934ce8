//! EntryStore: the shared pending-entry collection and its delivery log.
//!
//! One `RwLock` guards entries, delivery records and the quarantine table
//! together, so every mutation is atomic with respect to the others. The
//! lock is never held across an `.await`. In-flight dispatch claims live in
//! a separate set so the poll loop can hold them through the network calls.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use uuid::Uuid;

use super::model::{DeliveryRecord, Entry, EntryEvent, QuarantineInfo, ValidatedEntry};

/// The requested entry is not in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("entry {0} not found")]
pub struct NotFound(pub Uuid);

#[derive(Default)]
struct StoreInner {
    entries: HashMap<Uuid, Entry>,
    records: Vec<DeliveryRecord>,
    quarantine: HashMap<Uuid, QuarantineInfo>,
}

pub struct EntryStore {
    inner: RwLock<StoreInner>,
    in_flight: Arc<Mutex<HashSet<Uuid>>>,
    event_tx: broadcast::Sender<EntryEvent>,
}

impl Default for EntryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EntryStore {
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(64);
        Self {
            inner: RwLock::new(StoreInner::default()),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            event_tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EntryEvent> {
        self.event_tx.subscribe()
    }

    // ── Entries ──────────────────────────────────────────────────────

    pub fn create(&self, input: ValidatedEntry) -> Entry {
        let entry = Entry::from_validated(input);
        self.inner.write().entries.insert(entry.id, entry.clone());
        let _ = self.event_tx.send(EntryEvent::EntryCreated {
            entry: entry.clone(),
        });
        entry
    }

    /// Insert a batch under a single write lock.
    pub fn create_many(&self, inputs: Vec<ValidatedEntry>) -> Vec<Entry> {
        let created: Vec<Entry> = inputs.into_iter().map(Entry::from_validated).collect();
        {
            let mut inner = self.inner.write();
            for e in &created {
                inner.entries.insert(e.id, e.clone());
            }
        }
        for e in &created {
            let _ = self
                .event_tx
                .send(EntryEvent::EntryCreated { entry: e.clone() });
        }
        created
    }

    /// Store an entry as-is, bypassing validation.
    #[cfg(test)]
    pub(crate) fn insert_unchecked(&self, entry: Entry) {
        self.inner.write().entries.insert(entry.id, entry);
    }

    /// All pending entries, oldest first.
    pub fn list(&self) -> Vec<Entry> {
        let mut entries: Vec<Entry> = self.inner.read().entries.values().cloned().collect();
        entries.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        entries
    }

    pub fn get(&self, id: &Uuid) -> Result<Entry, NotFound> {
        self.inner
            .read()
            .entries
            .get(id)
            .cloned()
            .ok_or(NotFound(*id))
    }

    pub fn delete(&self, id: &Uuid) -> Result<Entry, NotFound> {
        let removed = {
            let mut inner = self.inner.write();
            let removed = inner.entries.remove(id);
            if removed.is_some() {
                inner.quarantine.remove(id);
            }
            removed
        };
        match removed {
            Some(entry) => {
                let _ = self.event_tx.send(EntryEvent::EntryDeleted { entry_id: *id });
                Ok(entry)
            }
            None => Err(NotFound(*id)),
        }
    }

    /// Point-in-time copy of the pending entries. Later mutations of the
    /// store do not affect it.
    pub fn snapshot(&self) -> Vec<Entry> {
        self.list()
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ── Dispatch claims ──────────────────────────────────────────────

    /// Mark `id` as being dispatched. Returns `None` if another holder
    /// already has it or the entry is no longer stored (a stale snapshot);
    /// the claim is released when the guard drops.
    pub fn claim(&self, id: Uuid) -> Option<DispatchClaim> {
        let mut in_flight = self.in_flight.lock();
        if !self.inner.read().entries.contains_key(&id) {
            return None;
        }
        if in_flight.insert(id) {
            Some(DispatchClaim {
                id,
                in_flight: self.in_flight.clone(),
            })
        } else {
            None
        }
    }

    pub fn is_claimed(&self, id: &Uuid) -> bool {
        self.in_flight.lock().contains(id)
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().len()
    }

    /// Remove the entries behind `records` and append the records, in one
    /// critical section. An entry that is already gone is skipped; its
    /// record is still kept because the message went out. Returns how many
    /// entries were actually removed.
    pub fn commit_deliveries(&self, records: Vec<DeliveryRecord>) -> usize {
        if records.is_empty() {
            return 0;
        }
        let mut removed = 0;
        {
            let mut inner = self.inner.write();
            for record in &records {
                if inner.entries.remove(&record.entry_id).is_some() {
                    removed += 1;
                }
                inner.quarantine.remove(&record.entry_id);
                inner.records.push(record.clone());
            }
        }
        for record in records {
            let _ = self.event_tx.send(EntryEvent::EntryDispatched { record });
        }
        removed
    }

    // ── Delivery records ─────────────────────────────────────────────

    pub fn list_delivery_records(&self) -> Vec<DeliveryRecord> {
        self.inner.read().records.clone()
    }

    pub fn records_for(&self, entry_id: &Uuid) -> Vec<DeliveryRecord> {
        self.inner
            .read()
            .records
            .iter()
            .filter(|r| r.entry_id == *entry_id)
            .cloned()
            .collect()
    }

    pub fn delivery_count(&self) -> usize {
        self.inner.read().records.len()
    }

    // ── Quarantine ───────────────────────────────────────────────────

    /// Count one more consecutive due-check data error for `id`. Returns
    /// the new attempt count, or `None` if the entry is no longer stored.
    pub fn record_due_error(&self, id: &Uuid, message: &str) -> Option<u32> {
        let now = Utc::now();
        let mut inner = self.inner.write();
        if !inner.entries.contains_key(id) {
            return None;
        }
        let info = inner.quarantine.entry(*id).or_insert_with(|| QuarantineInfo {
            entry_id: *id,
            attempts: 0,
            last_error: String::new(),
            first_failed_at: now,
            last_failed_at: now,
        });
        info.attempts += 1;
        info.last_error = message.to_string();
        info.last_failed_at = now;
        Some(info.attempts)
    }

    pub fn clear_due_error(&self, id: &Uuid) {
        // Called for every healthy entry each cycle; avoid the write lock.
        if self.inner.read().quarantine.contains_key(id) {
            self.inner.write().quarantine.remove(id);
        }
    }

    /// Entries whose consecutive due-check failures reached `threshold`.
    pub fn quarantined(&self, threshold: u32) -> Vec<QuarantineInfo> {
        let mut rows: Vec<QuarantineInfo> = self
            .inner
            .read()
            .quarantine
            .values()
            .filter(|q| q.attempts >= threshold)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.first_failed_at.cmp(&b.first_failed_at));
        rows
    }
}

/// RAII in-flight marker for one entry id.
pub struct DispatchClaim {
    id: Uuid,
    in_flight: Arc<Mutex<HashSet<Uuid>>>,
}

impl DispatchClaim {
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Drop for DispatchClaim {
    fn drop(&mut self) {
        self.in_flight.lock().remove(&self.id);
    }
}
