//! # photoferry-core
//!
//! Mailbox-to-photo-library ingestion pipeline.
//!
//! This crate provides:
//! - Candidate message matching (exact sender and subject filters)
//! - Attachment extraction with format and size validation
//! - A durable content-fingerprint ledger (`SQLite`) for cross-run dedup
//! - Upload coordination with bounded-backoff retry and partial-failure
//!   handling
//! - Run orchestration and summary reporting
//!
//! The mailbox transport and the remote photo library are collaborators
//! behind the [`service`] traits; production implementations bridge to the
//! `photoferry-imap` and `photoferry-photos` crates.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod config;
mod error;
pub mod ledger;
pub mod pipeline;
pub mod service;

pub use config::{Config, ValidationError, ValidationResult, validate_config};
pub use error::{Error, Result};
pub use ledger::{ContentFingerprint, DedupLedger, LedgerEntry};
pub use pipeline::{
    AttachmentRecord, CandidateMessage, FailedItem, FailureKind, RunSummary, SkipReason,
    UploadOutcome, run,
};
pub use service::{
    AlbumHandle, ImapMailbox, Mailbox, MailboxError, MediaHandle, PhotoError, PhotoLibrary,
    SearchQuery,
};
