//! Dedup ledger: content fingerprints and their durable upload record.

mod model;
mod repository;

pub use model::{ContentFingerprint, LedgerEntry};
pub use repository::DedupLedger;
