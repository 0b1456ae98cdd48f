//! Per-ledger entry log, fencing, and read/write lifecycle
//!
//! A [`LedgerHandle`] is the writer/reader surface for one simulated
//! ledger. Handles are cheap clones over a shared record: the handle
//! returned by create and every handle returned by open operate on the
//! same entry log and fenced flag.

use crate::dispatch::DispatchMessage;
use crate::store::StoreShared;
use crate::types::{DigestType, Entry};
use crate::{Error, Result};
use bytes::Bytes;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Mutable state of one ledger, guarded as a unit.
struct LedgerState {
    entries: Vec<Entry>,
    fenced: bool,
    last_add_confirmed: Option<u64>,
}

/// One registered ledger: identity fixed at creation plus the guarded log.
pub(crate) struct LedgerRecord {
    pub(crate) id: u64,
    pub(crate) digest_type: DigestType,
    pub(crate) password: Bytes,
    state: Mutex<LedgerState>,
}

impl LedgerRecord {
    pub(crate) fn new(id: u64, digest_type: DigestType, password: Bytes) -> Self {
        Self {
            id,
            digest_type,
            password,
            state: Mutex::new(LedgerState {
                entries: Vec::new(),
                fenced: false,
                last_add_confirmed: None,
            }),
        }
    }

    /// Drop all stored entries. The last confirmed id is left as is, so a
    /// handle keeps reporting it after the store shuts down.
    pub(crate) fn clear_entries(&self) {
        self.state.lock().entries.clear();
    }
}

/// Handle to one simulated ledger.
///
/// Appends are legal until the ledger is fenced (by [`close`](Self::close)
/// or [`fence`](Self::fence)); reads stay legal afterwards. Deleting the
/// ledger from the store does not revoke the handle.
#[derive(Clone)]
pub struct LedgerHandle {
    record: Arc<LedgerRecord>,
    store: Arc<StoreShared>,
}

impl LedgerHandle {
    pub(crate) fn new(record: Arc<LedgerRecord>, store: Arc<StoreShared>) -> Self {
        Self { record, store }
    }

    /// Ledger id, fixed at creation.
    pub fn id(&self) -> u64 {
        self.record.id
    }

    /// Append an entry, returning its assigned id.
    ///
    /// Ids are dense and zero-based: the Nth successful append returns N−1.
    pub fn append(&self, data: &[u8]) -> Result<u64> {
        self.append_inner(Bytes::copy_from_slice(data))
    }

    /// Asynchronous [`append`](Self::append): the assigned id (or error) is
    /// delivered to `cb` through the store's dispatch worker.
    pub fn append_async<F>(&self, data: &[u8], cb: F)
    where
        F: FnOnce(Result<u64>) + Send + 'static,
    {
        self.store.dispatch(DispatchMessage::Append {
            handle: self.clone(),
            payload: Bytes::copy_from_slice(data),
            cb: Box::new(cb),
        });
    }

    pub(crate) fn append_inner(&self, payload: Bytes) -> Result<u64> {
        // Stopped-state is checked before fenced-state, so a fenced ledger
        // on a stopped store reports the store's unavailable code on both
        // call paths.
        if self.store.is_stopped() {
            return Err(Error::WriteFailed);
        }

        let mut state = self.record.state.lock();
        if state.fenced {
            return Err(Error::LedgerFenced);
        }

        let entry_id = state.entries.len() as u64;
        state.entries.push(Entry {
            ledger_id: self.record.id,
            entry_id,
            payload,
        });
        state.last_add_confirmed = Some(entry_id);
        Ok(entry_id)
    }

    /// Read the entries with ids in `[first_entry, last_entry]`.
    ///
    /// The range is silently clamped to what is stored: a partially or fully
    /// out-of-range request returns the overlap (possibly empty), never an
    /// error. Fails only when the store has been shut down.
    pub fn read(&self, first_entry: u64, last_entry: u64) -> Result<Vec<Entry>> {
        self.read_inner(first_entry, last_entry)
    }

    /// Asynchronous [`read`](Self::read).
    pub fn read_async<F>(&self, first_entry: u64, last_entry: u64, cb: F)
    where
        F: FnOnce(Result<Vec<Entry>>) + Send + 'static,
    {
        self.store.dispatch(DispatchMessage::Read {
            handle: self.clone(),
            first_entry,
            last_entry,
            cb: Box::new(cb),
        });
    }

    pub(crate) fn read_inner(&self, first_entry: u64, last_entry: u64) -> Result<Vec<Entry>> {
        if self.store.is_stopped() {
            debug!("Read on stopped store, ledger {}", self.record.id);
            return Err(Error::WriteFailed);
        }

        let state = self.record.state.lock();
        debug!(
            "readEntries: first={} last={} total={}",
            first_entry,
            last_entry,
            state.entries.len()
        );

        let stored = state.entries.len() as u64;
        let first = first_entry.min(stored) as usize;
        let end = last_entry.saturating_add(1).min(stored) as usize;
        if first >= end {
            return Ok(Vec::new());
        }
        Ok(state.entries[first..end].to_vec())
    }

    /// Fence the ledger and report success.
    ///
    /// Idempotent: closing an already-fenced ledger succeeds again.
    pub fn close(&self) -> Result<()> {
        self.close_inner()
    }

    /// Asynchronous [`close`](Self::close).
    pub fn close_async<F>(&self, cb: F)
    where
        F: FnOnce(Result<()>) + Send + 'static,
    {
        self.store.dispatch(DispatchMessage::CloseLedger {
            handle: self.clone(),
            cb: Box::new(cb),
        });
    }

    pub(crate) fn close_inner(&self) -> Result<()> {
        self.record.state.lock().fenced = true;
        Ok(())
    }

    /// Permanently disable appends without going through close.
    pub fn fence(&self) {
        self.record.state.lock().fenced = true;
    }

    /// Whether the ledger has been fenced.
    pub fn is_fenced(&self) -> bool {
        self.record.state.lock().fenced
    }

    /// Total payload bytes currently stored, recomputed on every call.
    pub fn length(&self) -> u64 {
        self.record
            .state
            .lock()
            .entries
            .iter()
            .map(Entry::length)
            .sum()
    }

    /// Highest entry id ever confirmed, `None` before the first append.
    pub fn last_add_confirmed(&self) -> Option<u64> {
        self.record.state.lock().last_add_confirmed
    }

    /// Number of entries currently stored.
    pub fn entry_count(&self) -> usize {
        self.record.state.lock().entries.len()
    }
}

impl fmt::Debug for LedgerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LedgerHandle")
            .field("id", &self.record.id)
            .field("entries", &self.entry_count())
            .field("fenced", &self.is_fenced())
            .finish()
    }
}
