//! Error codes for the simulated ledger store

use thiserror::Error;

/// Result type for simulator operations
pub type Result<T> = std::result::Result<T, Error>;

/// Closed set of error codes the simulator reports.
///
/// The same codes cover real state errors and injected faults:
/// [`LedgerStore::fail_after`](crate::LedgerStore::fail_after) accepts any
/// variant as the code to fire.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The store is stopped or the backend rejected the write
    #[error("ledger store unavailable, write failed")]
    WriteFailed,

    /// No ledger is registered under the requested id
    #[error("no such ledger")]
    NoSuchLedger,

    /// Digest type differs from the one recorded at creation
    #[error("digest type mismatch")]
    DigestMismatch,

    /// Password differs from the one recorded at creation
    #[error("unauthorized access to ledger")]
    UnauthorizedAccess,

    /// The ledger is fenced and accepts no further appends
    #[error("ledger fenced")]
    LedgerFenced,

    /// The dispatch worker is gone (store dropped with a call in flight)
    #[error("dispatch worker closed")]
    DispatchClosed,
}
