//! Error types for the core pipeline.
//!
//! Only failures that make the whole run unsafe or meaningless live here:
//! losing the mailbox (no trustworthy candidate list) or losing the ledger
//! (no at-most-once guarantee). Message- and attachment-level failures are
//! data, not errors; they flow through extraction results and
//! [`crate::pipeline::UploadOutcome`].

use thiserror::Error;

use crate::service::MailboxError;

/// Fatal errors that abort a pipeline run.
#[derive(Debug, Error)]
pub enum Error {
    /// Mailbox connection, authentication, or search failed.
    #[error("Mailbox unavailable: {0}")]
    Mailbox(#[from] MailboxError),

    /// The dedup ledger's backing store failed.
    #[error("Ledger unavailable: {0}")]
    Ledger(#[from] sqlx::Error),

    /// Configuration could not be loaded or is invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
