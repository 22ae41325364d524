//! The ingestion-and-upload pipeline.
//!
//! Data flows match → extract → dedup → upload → summary. Each stage's rules
//! are built from [`crate::config::Config`]; the mailbox and photo library
//! collaborators come in through the [`crate::service`] traits.

mod extract;
mod matcher;
mod runner;
mod upload;

pub use extract::{AttachmentRecord, ExtractError, ExtractRule, Extraction, extract};
pub use matcher::{CandidateMessage, MatchRule, find_candidates};
pub use runner::{FailedItem, RunSummary, run};
pub use upload::{Backoff, FailureKind, SkipReason, UploadCoordinator, UploadOutcome};
