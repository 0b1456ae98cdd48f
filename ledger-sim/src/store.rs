//! Ledger registry, id issuance, stop state, and fault injection
//!
//! [`LedgerStore`] is the root object of the simulation. It owns the id
//! sequence and the ledger registry, carries the one-way stop flag, and
//! hosts the fault injector that lets tests force a specific error code
//! after a chosen number of successful guarded calls.

use crate::dispatch::{spawn_dispatch_worker, DispatchMessage};
use crate::handle::{LedgerHandle, LedgerRecord};
use crate::types::DigestType;
use crate::{Error, Result, SimConfig};
use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// State shared between a store and every handle it has issued.
pub(crate) struct StoreShared {
    config: SimConfig,

    /// Registry of live ledgers
    ledgers: DashMap<u64, Arc<LedgerRecord>>,

    /// Next ledger id; monotonic, never reused after deletion
    sequence: AtomicU64,

    /// One-way stop flag, set by shutdown
    stopped: AtomicBool,

    /// Guarded calls left before the injected fault fires; negative means
    /// disarmed
    steps_to_fail: AtomicI64,

    /// Code the injected fault fires with
    fail_code: Mutex<Error>,

    /// Mailbox of the dispatch worker
    dispatch_tx: mpsc::UnboundedSender<DispatchMessage>,
}

impl StoreShared {
    pub(crate) fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Consume one fault-injection decision.
    ///
    /// The counter is decremented on every guarded call and compared to
    /// zero exactly once, so an armed fault fires a single time and the
    /// counter then falls through zero for good. Re-arming requires
    /// another `fail_after`.
    fn consume_fault(&self) -> Result<()> {
        if self.steps_to_fail.fetch_sub(1, Ordering::SeqCst) == 0 {
            Err(*self.fail_code.lock())
        } else {
            Ok(())
        }
    }

    /// Enqueue a message for the dispatch worker, delivering
    /// [`Error::DispatchClosed`] to the callback if the worker is gone.
    pub(crate) fn dispatch(&self, msg: DispatchMessage) {
        if let Err(mpsc::error::SendError(msg)) = self.dispatch_tx.send(msg) {
            msg.fail(Error::DispatchClosed);
        }
    }

    pub(crate) fn create_ledger_inner(
        self: &Arc<Self>,
        digest_type: DigestType,
        password: Bytes,
    ) -> Result<LedgerHandle> {
        if self.is_stopped() {
            return Err(Error::WriteFailed);
        }
        self.consume_fault()?;

        let id = self.sequence.fetch_add(1, Ordering::SeqCst);
        info!("Creating ledger {}", id);
        let record = Arc::new(LedgerRecord::new(id, digest_type, password));
        self.ledgers.insert(id, Arc::clone(&record));
        Ok(LedgerHandle::new(record, Arc::clone(self)))
    }

    pub(crate) fn open_ledger_inner(
        self: &Arc<Self>,
        id: u64,
        digest_type: DigestType,
        password: &[u8],
    ) -> Result<LedgerHandle> {
        self.consume_fault()?;

        if self.is_stopped() {
            return Err(Error::WriteFailed);
        }

        let record = match self.ledgers.get(&id) {
            Some(record) => Arc::clone(record.value()),
            None => return Err(Error::NoSuchLedger),
        };
        if record.digest_type != digest_type {
            return Err(Error::DigestMismatch);
        }
        if record.password.as_ref() != password {
            return Err(Error::UnauthorizedAccess);
        }
        Ok(LedgerHandle::new(record, Arc::clone(self)))
    }

    pub(crate) fn delete_ledger_inner(&self, id: u64) -> Result<()> {
        self.consume_fault()?;

        if self.is_stopped() {
            return Err(Error::WriteFailed);
        }
        if self.ledgers.remove(&id).is_none() {
            return Err(Error::NoSuchLedger);
        }
        debug!("Deleted ledger {}", id);
        Ok(())
    }

    pub(crate) fn close_inner(&self) -> Result<()> {
        self.consume_fault()
    }
}

/// In-memory simulation of a distributed ledger-store client.
///
/// Clones share the same underlying store. Construction spawns the dispatch
/// worker for asynchronous completions and therefore must happen inside a
/// Tokio runtime.
#[derive(Clone)]
pub struct LedgerStore {
    shared: Arc<StoreShared>,
}

impl LedgerStore {
    /// Create a store with default configuration.
    pub fn new() -> Self {
        Self::with_config(SimConfig::default())
    }

    /// Create a store with explicit configuration.
    pub fn with_config(config: SimConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        spawn_dispatch_worker(rx);

        let shared = Arc::new(StoreShared {
            ledgers: DashMap::new(),
            sequence: AtomicU64::new(config.first_ledger_id),
            stopped: AtomicBool::new(false),
            steps_to_fail: AtomicI64::new(-1),
            fail_code: Mutex::new(Error::WriteFailed),
            dispatch_tx: tx,
            config,
        });
        Self { shared }
    }

    /// Create a ledger using the configured default quorum sizes.
    pub fn create_ledger(
        &self,
        digest_type: DigestType,
        password: &[u8],
    ) -> Result<LedgerHandle> {
        let config = &self.shared.config;
        self.create_ledger_with_quorums(
            config.default_ensemble_size,
            config.default_write_quorum,
            config.default_ack_quorum,
            digest_type,
            password,
        )
    }

    /// Create a ledger.
    ///
    /// Quorum sizing is accepted for call-surface compatibility and ignored:
    /// the simulated store is single-node. Fails with
    /// [`Error::WriteFailed`] once the store has been shut down; an injected
    /// fault fails the call with the configured code and leaves no ledger
    /// behind.
    pub fn create_ledger_with_quorums(
        &self,
        _ensemble_size: usize,
        _write_quorum: usize,
        _ack_quorum: usize,
        digest_type: DigestType,
        password: &[u8],
    ) -> Result<LedgerHandle> {
        self.shared
            .create_ledger_inner(digest_type, Bytes::copy_from_slice(password))
    }

    /// Asynchronous [`create_ledger_with_quorums`](Self::create_ledger_with_quorums):
    /// the outcome is delivered to `cb` through the dispatch worker.
    pub fn create_ledger_async<F>(
        &self,
        _ensemble_size: usize,
        _write_quorum: usize,
        _ack_quorum: usize,
        digest_type: DigestType,
        password: &[u8],
        cb: F,
    ) where
        F: FnOnce(Result<LedgerHandle>) + Send + 'static,
    {
        self.shared.dispatch(DispatchMessage::CreateLedger {
            store: Arc::clone(&self.shared),
            digest_type,
            password: Bytes::copy_from_slice(password),
            cb: Box::new(cb),
        });
    }

    /// Open an existing ledger.
    ///
    /// The fault decision is consumed before anything else; an injected
    /// failure skips the lookup entirely. Digest type is checked before the
    /// password, so a ledger opened with both wrong reports
    /// [`Error::DigestMismatch`].
    pub fn open_ledger(
        &self,
        id: u64,
        digest_type: DigestType,
        password: &[u8],
    ) -> Result<LedgerHandle> {
        self.shared.open_ledger_inner(id, digest_type, password)
    }

    /// Asynchronous [`open_ledger`](Self::open_ledger).
    pub fn open_ledger_async<F>(&self, id: u64, digest_type: DigestType, password: &[u8], cb: F)
    where
        F: FnOnce(Result<LedgerHandle>) + Send + 'static,
    {
        self.shared.dispatch(DispatchMessage::OpenLedger {
            store: Arc::clone(&self.shared),
            id,
            digest_type,
            password: Bytes::copy_from_slice(password),
            cb: Box::new(cb),
        });
    }

    /// Open without recovery. Recovery is meaningless for the in-memory
    /// store, so this behaves exactly like [`open_ledger`](Self::open_ledger).
    pub fn open_ledger_no_recovery(
        &self,
        id: u64,
        digest_type: DigestType,
        password: &[u8],
    ) -> Result<LedgerHandle> {
        self.open_ledger(id, digest_type, password)
    }

    /// Asynchronous [`open_ledger_no_recovery`](Self::open_ledger_no_recovery).
    pub fn open_ledger_no_recovery_async<F>(
        &self,
        id: u64,
        digest_type: DigestType,
        password: &[u8],
        cb: F,
    ) where
        F: FnOnce(Result<LedgerHandle>) + Send + 'static,
    {
        self.open_ledger_async(id, digest_type, password, cb);
    }

    /// Delete a ledger from the registry.
    ///
    /// Outstanding handles are not revoked; they keep operating on the
    /// removed record's in-memory log.
    pub fn delete_ledger(&self, id: u64) -> Result<()> {
        self.shared.delete_ledger_inner(id)
    }

    /// Asynchronous [`delete_ledger`](Self::delete_ledger).
    pub fn delete_ledger_async<F>(&self, id: u64, cb: F)
    where
        F: FnOnce(Result<()>) + Send + 'static,
    {
        self.shared.dispatch(DispatchMessage::DeleteLedger {
            store: Arc::clone(&self.shared),
            id,
            cb: Box::new(cb),
        });
    }

    /// Close the client connection.
    ///
    /// A guarded no-op: it consumes one fault-injection decision and
    /// otherwise succeeds without changing store state.
    pub fn close(&self) -> Result<()> {
        self.shared.close_inner()
    }

    /// Stop the store and drop every ledger.
    ///
    /// Entry logs are cleared before the registry is emptied so outstanding
    /// handles observe an empty log. One-way for the life of the store.
    pub fn shutdown(&self) {
        info!("Shutting down ledger store");
        self.shared.stopped.store(true, Ordering::SeqCst);
        for record in self.shared.ledgers.iter() {
            record.value().clear_entries();
        }
        self.shared.ledgers.clear();
    }

    /// Whether the store has been shut down.
    pub fn is_stopped(&self) -> bool {
        self.shared.is_stopped()
    }

    /// Ids of all registered ledgers.
    pub fn ledger_ids(&self) -> BTreeSet<u64> {
        self.shared.ledgers.iter().map(|record| *record.key()).collect()
    }

    /// Arm the fault injector to fail the very next guarded call with `code`.
    pub fn fail_now(&self, code: Error) {
        self.fail_after(0, code);
    }

    /// Arm the fault injector: the next `steps` guarded calls succeed, the
    /// one after fails once with `code`, and every later call succeeds
    /// again. Guarded calls are create, open, delete, and client close.
    pub fn fail_after(&self, steps: i64, code: Error) {
        *self.shared.fail_code.lock() = code;
        self.shared.steps_to_fail.store(steps, Ordering::SeqCst);
    }
}

impl Default for LedgerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LedgerStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LedgerStore")
            .field("ledgers", &self.shared.ledgers.len())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}
