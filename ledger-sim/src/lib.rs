//! In-memory simulation of a distributed append-only ledger store.
//!
//! Reproduces the observable contract of a replicated-log client — ledger
//! creation, append, read, fencing, and deletion, each with a synchronous
//! and a callback-based asynchronous surface — plus deterministic fault
//! injection, so systems built on such a log can exercise their
//! failure-handling paths without a real cluster.
//!
//! # Architecture
//!
//! - **Single registry**: [`LedgerStore`] owns the id sequence, the ledger
//!   registry, the stop flag, and the fault-injection counter
//! - **Shared handles**: [`LedgerHandle`] clones share one entry log;
//!   re-opening a ledger observes the creator's appends
//! - **Single dispatch worker**: all asynchronous completions for one store
//!   are delivered from one task, in call-issue order
//!
//! # Example
//!
//! ```no_run
//! use ledger_sim::{DigestType, LedgerStore};
//!
//! #[tokio::main]
//! async fn main() -> ledger_sim::Result<()> {
//!     let store = LedgerStore::new();
//!
//!     let ledger = store.create_ledger(DigestType::Mac, b"secret")?;
//!     let entry_id = ledger.append(b"payload")?;
//!     let entries = ledger.read(0, entry_id)?;
//!     assert_eq!(entries.len(), 1);
//!
//!     // force the next guarded call to fail, then watch it recover
//!     store.fail_now(ledger_sim::Error::WriteFailed);
//!     assert!(store.create_ledger(DigestType::Mac, b"secret").is_err());
//!     assert!(store.create_ledger(DigestType::Mac, b"secret").is_ok());
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod config;
mod dispatch;
pub mod error;
pub mod handle;
pub mod store;
pub mod types;

// Re-exports
pub use config::SimConfig;
pub use error::{Error, Result};
pub use handle::LedgerHandle;
pub use store::LedgerStore;
pub use types::{DigestType, Entry};
