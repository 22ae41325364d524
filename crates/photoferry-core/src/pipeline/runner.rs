//! Pipeline orchestration and run summary.

use tracing::{error, info, warn};

use photoferry_imap::Uid;

use super::extract::{ExtractError, ExtractRule, extract};
use super::matcher::{MatchRule, find_candidates};
use super::upload::{FailureKind, UploadCoordinator, UploadOutcome};
use crate::Result;
use crate::config::Config;
use crate::ledger::DedupLedger;
use crate::service::{Mailbox, PhotoLibrary};

/// One attachment that did not reach the album, with its reason.
#[derive(Debug, Clone)]
pub struct FailedItem {
    /// Attachment filename.
    pub filename: String,
    /// UID of the message it came from.
    pub message_uid: Uid,
    /// Transient or permanent.
    pub kind: FailureKind,
    /// Human-readable cause.
    pub detail: String,
}

/// Aggregated result of one pipeline run.
///
/// The summary is the run's externally visible success signal: a run with
/// failed items is still a successful run as long as the mailbox query and
/// extraction completed.
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Candidate messages found.
    pub candidates: u32,
    /// Attachments that passed validation.
    pub extracted: u32,
    /// Attachment parts excluded during extraction (diagnostic).
    pub rejected_parts: u32,
    /// Messages skipped because their structure could not be parsed.
    pub corrupt_messages: u32,
    /// Attachments skipped as duplicates.
    pub skipped_duplicates: u32,
    /// Attachments uploaded and filed into the album.
    pub uploaded: u32,
    /// Uploads that exhausted retries on transient failures.
    pub failed_transient: u32,
    /// Uploads that failed permanently.
    pub failed_permanent: u32,
    /// Every failed item, with its reason.
    pub failures: Vec<FailedItem>,
}

impl RunSummary {
    /// Total failed uploads.
    #[must_use]
    pub const fn failed(&self) -> u32 {
        self.failed_transient + self.failed_permanent
    }
}

/// Runs the pipeline once: match, extract, dedup, upload, summarize.
///
/// Message- and attachment-level problems are absorbed into the summary;
/// only mailbox and ledger failures abort the run.
///
/// # Errors
///
/// Returns an error if the mailbox search fails or the ledger becomes
/// unavailable.
pub async fn run<M: Mailbox, P: PhotoLibrary>(
    mailbox: &mut M,
    photos: &P,
    ledger: &DedupLedger,
    config: &Config,
) -> Result<RunSummary> {
    let mut summary = RunSummary::default();

    // Phase 1: candidates.
    let match_rule = MatchRule::from_config(config);
    let candidates = find_candidates(mailbox, &match_rule).await?;
    summary.candidates = candidates.len() as u32;

    if candidates.is_empty() {
        info!("No candidate messages found");
        return Ok(summary);
    }

    // Phase 2: extraction. Corrupt messages are skipped, not fatal.
    let extract_rule = ExtractRule::from_config(config);
    let mut attachments = Vec::new();
    for candidate in &candidates {
        match extract(candidate, &extract_rule) {
            Ok(extraction) => {
                summary.rejected_parts += extraction.rejected;
                attachments.extend(extraction.accepted);
            }
            Err(ExtractError::CorruptMessage(detail)) => {
                warn!(uid = %candidate.uid, detail, "Skipping corrupt message");
                summary.corrupt_messages += 1;
            }
        }
    }
    drop(candidates);
    summary.extracted = attachments.len() as u32;

    if attachments.is_empty() {
        info!(
            candidates = summary.candidates,
            rejected = summary.rejected_parts,
            "No valid attachments to upload"
        );
        return Ok(summary);
    }

    // Phase 3: album. Losing the photo service fails the items, not the run:
    // the mailbox work above already succeeded and the summary reports it.
    let album = match photos.ensure_album(&config.uploads.album_name).await {
        Ok(album) => album,
        Err(e) => {
            error!(error = %e, "Photo library unavailable; failing all items");
            let kind = if e.is_retryable() {
                FailureKind::Transient
            } else {
                FailureKind::Permanent
            };
            for record in attachments {
                note_failure(&mut summary, record.filename, record.message_uid, kind, e.to_string());
            }
            log_summary(&summary);
            return Ok(summary);
        }
    };

    // Phase 4: uploads.
    let coordinator = UploadCoordinator::new(photos, ledger, &config.uploads);
    for record in attachments {
        let filename = record.filename.clone();
        let message_uid = record.message_uid;

        let (_fingerprint, outcome) = coordinator.upload(record, &album).await?;
        match outcome {
            UploadOutcome::Uploaded { .. } => summary.uploaded += 1,
            UploadOutcome::Skipped { .. } => summary.skipped_duplicates += 1,
            UploadOutcome::Failed { kind, detail } => {
                note_failure(&mut summary, filename, message_uid, kind, detail);
            }
        }
    }

    log_summary(&summary);
    Ok(summary)
}

fn note_failure(
    summary: &mut RunSummary,
    filename: String,
    message_uid: Uid,
    kind: FailureKind,
    detail: String,
) {
    match kind {
        FailureKind::Transient => summary.failed_transient += 1,
        FailureKind::Permanent => summary.failed_permanent += 1,
    }
    summary.failures.push(FailedItem {
        filename,
        message_uid,
        kind,
        detail,
    });
}

fn log_summary(summary: &RunSummary) {
    info!(
        candidates = summary.candidates,
        extracted = summary.extracted,
        rejected = summary.rejected_parts,
        corrupt = summary.corrupt_messages,
        duplicates = summary.skipped_duplicates,
        uploaded = summary.uploaded,
        failed = summary.failed(),
        "Run completed"
    );
    for item in &summary.failures {
        warn!(
            filename = %item.filename,
            uid = %item.message_uid,
            kind = %item.kind,
            detail = %item.detail,
            "Failed item"
        );
    }
}
