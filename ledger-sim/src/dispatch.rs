//! Single-worker dispatch of asynchronous completions
//!
//! Every asynchronous operation on a store or one of its handles is turned
//! into a [`DispatchMessage`] and queued for one worker task spawned per
//! store. The worker executes the same core operation the synchronous path
//! runs and then invokes the caller's callback, so completion callbacks for
//! one store are observed in call-issue order.

use crate::handle::LedgerHandle;
use crate::store::StoreShared;
use crate::types::{DigestType, Entry};
use crate::{Error, Result};
use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

pub(crate) type HandleCallback = Box<dyn FnOnce(Result<LedgerHandle>) + Send>;
pub(crate) type AckCallback = Box<dyn FnOnce(Result<()>) + Send>;
pub(crate) type AppendCallback = Box<dyn FnOnce(Result<u64>) + Send>;
pub(crate) type ReadCallback = Box<dyn FnOnce(Result<Vec<Entry>>) + Send>;

/// Work item for the dispatch worker.
pub(crate) enum DispatchMessage {
    CreateLedger {
        store: Arc<StoreShared>,
        digest_type: DigestType,
        password: Bytes,
        cb: HandleCallback,
    },
    OpenLedger {
        store: Arc<StoreShared>,
        id: u64,
        digest_type: DigestType,
        password: Bytes,
        cb: HandleCallback,
    },
    DeleteLedger {
        store: Arc<StoreShared>,
        id: u64,
        cb: AckCallback,
    },
    Append {
        handle: LedgerHandle,
        payload: Bytes,
        cb: AppendCallback,
    },
    Read {
        handle: LedgerHandle,
        first_entry: u64,
        last_entry: u64,
        cb: ReadCallback,
    },
    CloseLedger {
        handle: LedgerHandle,
        cb: AckCallback,
    },
}

impl DispatchMessage {
    /// Execute the operation and deliver its single outcome.
    fn run(self) {
        match self {
            DispatchMessage::CreateLedger {
                store,
                digest_type,
                password,
                cb,
            } => cb(store.create_ledger_inner(digest_type, password)),
            DispatchMessage::OpenLedger {
                store,
                id,
                digest_type,
                password,
                cb,
            } => cb(store.open_ledger_inner(id, digest_type, &password)),
            DispatchMessage::DeleteLedger { store, id, cb } => cb(store.delete_ledger_inner(id)),
            DispatchMessage::Append {
                handle,
                payload,
                cb,
            } => cb(handle.append_inner(payload)),
            DispatchMessage::Read {
                handle,
                first_entry,
                last_entry,
                cb,
            } => cb(handle.read_inner(first_entry, last_entry)),
            DispatchMessage::CloseLedger { handle, cb } => cb(handle.close_inner()),
        }
    }

    /// Deliver `err` without executing; used when the worker is unreachable
    /// so that no call ever loses its outcome.
    pub(crate) fn fail(self, err: Error) {
        match self {
            DispatchMessage::CreateLedger { cb, .. } => cb(Err(err)),
            DispatchMessage::OpenLedger { cb, .. } => cb(Err(err)),
            DispatchMessage::DeleteLedger { cb, .. } => cb(Err(err)),
            DispatchMessage::Append { cb, .. } => cb(Err(err)),
            DispatchMessage::Read { cb, .. } => cb(Err(err)),
            DispatchMessage::CloseLedger { cb, .. } => cb(Err(err)),
        }
    }
}

/// Spawn the dispatch worker for one store.
///
/// The worker drains its mailbox in FIFO order and exits once the store and
/// every handle holding a sender have been dropped.
pub(crate) fn spawn_dispatch_worker(mut mailbox: mpsc::UnboundedReceiver<DispatchMessage>) {
    tokio::spawn(async move {
        while let Some(msg) = mailbox.recv().await {
            msg.run();
        }
        debug!("Dispatch worker drained");
    });
}

#[cfg(test)]
mod tests {
    use crate::{DigestType, Error, LedgerHandle, LedgerStore, Result};
    use tokio::sync::{mpsc, oneshot};

    async fn create_async(store: &LedgerStore) -> Result<LedgerHandle> {
        let (tx, rx) = oneshot::channel();
        store.create_ledger_async(3, 2, 2, DigestType::Mac, b"pw", move |res| {
            let _ = tx.send(res);
        });
        rx.await.expect("create callback dropped")
    }

    #[tokio::test]
    async fn test_async_create_append_read() {
        let store = LedgerStore::new();
        let lh = create_async(&store).await.unwrap();
        assert_eq!(lh.id(), 3);

        let (tx, rx) = oneshot::channel();
        lh.append_async(b"payload", move |res| {
            let _ = tx.send(res);
        });
        assert_eq!(rx.await.unwrap().unwrap(), 0);

        let (tx, rx) = oneshot::channel();
        lh.read_async(0, 10, move |res| {
            let _ = tx.send(res);
        });
        let entries = rx.await.unwrap().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].payload.as_ref(), b"payload");
    }

    #[tokio::test]
    async fn test_async_callbacks_arrive_in_issue_order() {
        let store = LedgerStore::new();
        let lh = store.create_ledger(DigestType::Mac, b"pw").unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        for i in 0..32u64 {
            let tx = tx.clone();
            lh.append_async(format!("payload-{i}").as_bytes(), move |res| {
                let _ = tx.send(res.unwrap());
            });
        }
        drop(tx);

        let mut seen = Vec::new();
        while let Some(id) = rx.recv().await {
            seen.push(id);
        }
        assert_eq!(seen, (0..32).collect::<Vec<u64>>());
    }

    #[tokio::test]
    async fn test_async_read_observes_prior_async_appends() {
        let store = LedgerStore::new();
        let lh = store.create_ledger(DigestType::Mac, b"pw").unwrap();

        for _ in 0..10 {
            lh.append_async(b"entry", |res| {
                res.unwrap();
            });
        }
        // issued after the appends, so the single worker runs it after them
        let (tx, rx) = oneshot::channel();
        lh.read_async(0, 100, move |res| {
            let _ = tx.send(res);
        });
        assert_eq!(rx.await.unwrap().unwrap().len(), 10);
    }

    #[tokio::test]
    async fn test_async_open_and_delete() {
        let store = LedgerStore::new();
        let lh = store.create_ledger(DigestType::Crc32, b"secret").unwrap();

        let (tx, rx) = oneshot::channel();
        store.open_ledger_async(lh.id(), DigestType::Crc32, b"secret", move |res| {
            let _ = tx.send(res);
        });
        assert_eq!(rx.await.unwrap().unwrap().id(), lh.id());

        let (tx, rx) = oneshot::channel();
        store.open_ledger_async(lh.id(), DigestType::Crc32, b"wrong", move |res| {
            let _ = tx.send(res);
        });
        assert_eq!(rx.await.unwrap().unwrap_err(), Error::UnauthorizedAccess);

        let (tx, rx) = oneshot::channel();
        store.delete_ledger_async(lh.id(), move |res| {
            let _ = tx.send(res);
        });
        rx.await.unwrap().unwrap();

        let (tx, rx) = oneshot::channel();
        store.delete_ledger_async(lh.id(), move |res| {
            let _ = tx.send(res);
        });
        assert_eq!(rx.await.unwrap().unwrap_err(), Error::NoSuchLedger);
    }

    #[tokio::test]
    async fn test_async_close_is_idempotent() {
        let store = LedgerStore::new();
        let lh = store.create_ledger(DigestType::Mac, b"pw").unwrap();

        for _ in 0..2 {
            let (tx, rx) = oneshot::channel();
            lh.close_async(move |res| {
                let _ = tx.send(res);
            });
            rx.await.unwrap().unwrap();
        }

        let (tx, rx) = oneshot::channel();
        lh.append_async(b"late", move |res| {
            let _ = tx.send(res);
        });
        assert_eq!(rx.await.unwrap().unwrap_err(), Error::LedgerFenced);
    }

    #[tokio::test]
    async fn test_async_append_checks_stopped_before_fenced() {
        let store = LedgerStore::new();
        let lh = store.create_ledger(DigestType::Mac, b"pw").unwrap();
        lh.close().unwrap();
        store.shutdown();

        let (tx, rx) = oneshot::channel();
        lh.append_async(b"x", move |res| {
            let _ = tx.send(res);
        });
        assert_eq!(rx.await.unwrap().unwrap_err(), Error::WriteFailed);
    }

    #[tokio::test]
    async fn test_async_fault_injection_is_one_shot() {
        let store = LedgerStore::new();
        store.fail_after(1, Error::WriteFailed);

        let (tx, mut rx) = mpsc::unbounded_channel();
        for _ in 0..3 {
            let tx = tx.clone();
            store.create_ledger_async(3, 2, 2, DigestType::Mac, b"pw", move |res| {
                let _ = tx.send(res.map(|lh| lh.id()));
            });
        }
        drop(tx);

        let mut outcomes = Vec::new();
        while let Some(res) = rx.recv().await {
            outcomes.push(res);
        }
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].is_ok());
        assert_eq!(outcomes[1], Err(Error::WriteFailed));
        assert!(outcomes[2].is_ok());
    }

    #[tokio::test]
    async fn test_async_read_on_stopped_store() {
        let store = LedgerStore::new();
        let lh = store.create_ledger(DigestType::Mac, b"pw").unwrap();
        lh.append(b"data").unwrap();
        store.shutdown();

        let (tx, rx) = oneshot::channel();
        lh.read_async(0, 0, move |res| {
            let _ = tx.send(res);
        });
        assert_eq!(rx.await.unwrap().unwrap_err(), Error::WriteFailed);
    }
}
