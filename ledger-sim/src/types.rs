//! Core types for the simulated ledger store

use bytes::Bytes;

/// Digest algorithm recorded at ledger creation.
///
/// The simulator never computes digests; the type is compared for equality
/// when a ledger is re-opened, nothing more.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DigestType {
    /// MAC digest
    Mac,
    /// CRC-32 digest
    Crc32,
    /// CRC-32C digest
    Crc32C,
    /// No digest
    Dummy,
}

/// One payload record within a ledger.
///
/// Entry ids are dense and zero-based: an entry's id always equals its index
/// in the owning ledger's log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Ledger this entry belongs to
    pub ledger_id: u64,
    /// Position in the ledger's log
    pub entry_id: u64,
    /// Entry payload
    pub payload: Bytes,
}

impl Entry {
    /// Payload size in bytes.
    pub fn length(&self) -> u64 {
        self.payload.len() as u64
    }
}
