//! Upload coordination: dedup gate, retry policy, ledger recording.

use chrono::Utc;
use std::collections::HashSet;
use std::fmt;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::extract::AttachmentRecord;
use crate::Result;
use crate::config::UploadConfig;
use crate::ledger::{ContentFingerprint, DedupLedger};
use crate::service::{AlbumHandle, MediaHandle, PhotoLibrary};

/// Why an attachment was skipped without contacting the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Content with this fingerprint was already uploaded, in a prior run or
    /// earlier in this one.
    Duplicate,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Duplicate => write!(f, "duplicate"),
        }
    }
}

/// How an upload failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Retries were exhausted on a retryable failure.
    Transient,
    /// A non-retryable failure, including album association after a
    /// successful byte upload.
    Permanent,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transient => write!(f, "transient"),
            Self::Permanent => write!(f, "permanent"),
        }
    }
}

/// Per-attachment upload result.
#[derive(Debug, Clone)]
pub enum UploadOutcome {
    /// Upload and album association both confirmed.
    Uploaded {
        /// Remote content handle.
        handle: MediaHandle,
    },
    /// Not uploaded, by design.
    Skipped {
        /// Why the item was skipped.
        reason: SkipReason,
    },
    /// Upload did not complete.
    Failed {
        /// Transient (retries exhausted) or permanent.
        kind: FailureKind,
        /// Human-readable cause.
        detail: String,
    },
}

/// Bounded exponential backoff.
///
/// Tracks attempts explicitly so boundary counts are testable without a
/// clock: `next_delay` is consulted after each failure and returns `None`
/// once the configured attempt budget is spent.
#[derive(Debug)]
pub struct Backoff {
    failures: u32,
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl Backoff {
    /// Delay cap; doubling stops here.
    const MAX_DELAY: Duration = Duration::from_secs(60);

    /// Creates a backoff allowing `max_attempts` total attempts.
    #[must_use]
    pub const fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            failures: 0,
            max_attempts,
            base_delay,
            max_delay: Self::MAX_DELAY,
        }
    }

    /// Registers a failure; returns the delay before the next attempt, or
    /// `None` when the attempt budget is exhausted.
    pub fn next_delay(&mut self) -> Option<Duration> {
        self.failures += 1;
        if self.failures >= self.max_attempts {
            return None;
        }

        let exponent = self.failures.saturating_sub(1).min(16);
        let delay = self.base_delay.saturating_mul(1 << exponent);
        Some(delay.min(self.max_delay))
    }
}

/// Drives extracted attachments through upload to the remote album.
///
/// Consults the ledger before contacting the remote service, retries
/// transient failures with bounded backoff, and records fingerprints only
/// after the full two-step success (upload + album association).
pub struct UploadCoordinator<'a, P> {
    photos: &'a P,
    ledger: &'a DedupLedger,
    max_attempts: u32,
    base_delay: Duration,
    /// Fingerprints claimed by an upload in this run. Serializes the
    /// check-then-record window so byte-identical attachments in one run
    /// cannot both reach the remote service.
    in_flight: Mutex<HashSet<String>>,
}

impl<'a, P: PhotoLibrary> UploadCoordinator<'a, P> {
    /// Default delay before the first retry.
    const BASE_DELAY: Duration = Duration::from_secs(2);

    /// Creates a coordinator over the given collaborators.
    pub fn new(photos: &'a P, ledger: &'a DedupLedger, config: &UploadConfig) -> Self {
        Self {
            photos,
            ledger,
            max_attempts: config.max_upload_attempts,
            base_delay: Self::BASE_DELAY,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Overrides the base retry delay (tests).
    #[must_use]
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Uploads one attachment, consuming its bytes.
    ///
    /// The record is dropped when this returns, whatever the outcome; failed
    /// bytes are never kept beyond the run.
    ///
    /// # Errors
    ///
    /// Returns a fatal error only if the ledger fails; remote failures are
    /// reported through the outcome.
    pub async fn upload(
        &self,
        record: AttachmentRecord,
        album: &AlbumHandle,
    ) -> Result<(ContentFingerprint, UploadOutcome)> {
        let fingerprint = ContentFingerprint::of(&record.content);

        if !self.reserve(&fingerprint) {
            debug!(filename = %record.filename, %fingerprint, "Duplicate within run; skipping");
            return Ok((
                fingerprint,
                UploadOutcome::Skipped {
                    reason: SkipReason::Duplicate,
                },
            ));
        }

        if !self.ledger.is_new(&fingerprint).await? {
            debug!(filename = %record.filename, %fingerprint, "Already in ledger; skipping");
            return Ok((
                fingerprint,
                UploadOutcome::Skipped {
                    reason: SkipReason::Duplicate,
                },
            ));
        }

        let outcome = self.attempt_upload(&record, album).await;

        match &outcome {
            UploadOutcome::Uploaded { handle } => {
                self.ledger
                    .record(&fingerprint, Utc::now(), &handle.0)
                    .await?;
                info!(filename = %record.filename, handle = %handle, "Uploaded");
            }
            UploadOutcome::Failed { kind, detail } => {
                // Release the claim: a byte-identical sibling later in the
                // run is allowed its own attempt.
                self.release(&fingerprint);
                warn!(filename = %record.filename, %kind, detail, "Upload failed");
            }
            UploadOutcome::Skipped { .. } => {}
        }

        Ok((fingerprint, outcome))
    }

    /// Runs the two remote steps under the retry policy.
    async fn attempt_upload(&self, record: &AttachmentRecord, album: &AlbumHandle) -> UploadOutcome {
        let mut backoff = Backoff::new(self.max_attempts, self.base_delay);

        loop {
            let handle = match self
                .photos
                .upload_bytes(&record.content, &record.filename)
                .await
            {
                Ok(handle) => handle,
                Err(e) if e.is_retryable() => match backoff.next_delay() {
                    Some(delay) => {
                        warn!(
                            filename = %record.filename,
                            error = %e,
                            ?delay,
                            "Transient upload failure; retrying"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    None => {
                        return UploadOutcome::Failed {
                            kind: FailureKind::Transient,
                            detail: e.to_string(),
                        };
                    }
                },
                Err(e) => {
                    return UploadOutcome::Failed {
                        kind: FailureKind::Permanent,
                        detail: e.to_string(),
                    };
                }
            };

            // Upload without album association is not success: leaving the
            // fingerprint unrecorded makes the next run retry the whole item
            // instead of silently forgetting an unfiled upload.
            return match self.photos.add_to_album(album, &handle).await {
                Ok(()) => UploadOutcome::Uploaded { handle },
                Err(e) => UploadOutcome::Failed {
                    kind: FailureKind::Permanent,
                    detail: format!("uploaded but album association failed: {e}"),
                },
            };
        }
    }

    fn reserve(&self, fingerprint: &ContentFingerprint) -> bool {
        self.in_flight
            .lock()
            .map(|mut set| set.insert(fingerprint.as_str().to_string()))
            .unwrap_or(false)
    }

    fn release(&self, fingerprint: &ContentFingerprint) {
        if let Ok(mut set) = self.in_flight.lock() {
            set.remove(fingerprint.as_str());
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::service::PhotoError;
    use photoferry_imap::Uid;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails `upload_bytes` the first `fail_uploads` times, then succeeds.
    struct FlakyLibrary {
        fail_uploads: u32,
        upload_error: PhotoError,
        album_fails: bool,
        upload_calls: AtomicU32,
    }

    impl FlakyLibrary {
        fn reliable() -> Self {
            Self::failing(0, PhotoError::Transient(String::new()))
        }

        fn failing(times: u32, error: PhotoError) -> Self {
            Self {
                fail_uploads: times,
                upload_error: error,
                album_fails: false,
                upload_calls: AtomicU32::new(0),
            }
        }
    }

    impl PhotoLibrary for FlakyLibrary {
        async fn ensure_album(&self, _title: &str) -> std::result::Result<AlbumHandle, PhotoError> {
            Ok(AlbumHandle("album-1".to_string()))
        }

        async fn upload_bytes(
            &self,
            _content: &[u8],
            filename: &str,
        ) -> std::result::Result<MediaHandle, PhotoError> {
            let call = self.upload_calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.fail_uploads {
                return Err(self.upload_error.clone());
            }
            Ok(MediaHandle(format!("media-{filename}-{call}")))
        }

        async fn add_to_album(
            &self,
            _album: &AlbumHandle,
            _media: &MediaHandle,
        ) -> std::result::Result<(), PhotoError> {
            if self.album_fails {
                return Err(PhotoError::Permanent("album gone".to_string()));
            }
            Ok(())
        }
    }

    fn record(filename: &str, content: &[u8]) -> AttachmentRecord {
        AttachmentRecord {
            filename: filename.to_string(),
            content: content.to_vec(),
            mime_type: "image/jpeg".to_string(),
            size: content.len() as u64,
            message_uid: Uid(1),
        }
    }

    fn album() -> AlbumHandle {
        AlbumHandle("album-1".to_string())
    }

    async fn coordinator_parts() -> DedupLedger {
        DedupLedger::in_memory().await.unwrap()
    }

    #[test]
    fn test_backoff_delays_grow_and_cap() {
        let mut backoff = Backoff::new(10, Duration::from_secs(2));
        assert_eq!(backoff.next_delay(), Some(Duration::from_secs(2)));
        assert_eq!(backoff.next_delay(), Some(Duration::from_secs(4)));
        assert_eq!(backoff.next_delay(), Some(Duration::from_secs(8)));
        assert_eq!(backoff.next_delay(), Some(Duration::from_secs(16)));
        assert_eq!(backoff.next_delay(), Some(Duration::from_secs(32)));
        assert_eq!(backoff.next_delay(), Some(Duration::from_secs(60)));
        assert_eq!(backoff.next_delay(), Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_backoff_exhausts_at_max_attempts() {
        let mut backoff = Backoff::new(3, Duration::from_millis(10));
        assert!(backoff.next_delay().is_some());
        assert!(backoff.next_delay().is_some());
        assert!(backoff.next_delay().is_none());
    }

    #[test]
    fn test_backoff_single_attempt_never_retries() {
        let mut backoff = Backoff::new(1, Duration::from_millis(10));
        assert!(backoff.next_delay().is_none());
    }

    #[tokio::test]
    async fn test_successful_upload_recorded() {
        let ledger = coordinator_parts().await;
        let photos = FlakyLibrary::reliable();
        let coordinator = UploadCoordinator::new(&photos, &ledger, &upload_config(3));

        let (fingerprint, outcome) = coordinator
            .upload(record("a.jpg", b"bytes-a"), &album())
            .await
            .unwrap();

        assert!(matches!(outcome, UploadOutcome::Uploaded { .. }));
        assert!(!ledger.is_new(&fingerprint).await.unwrap());
    }

    #[tokio::test]
    async fn test_ledger_duplicate_skipped_without_remote_call() {
        let ledger = coordinator_parts().await;
        let fingerprint = ContentFingerprint::of(b"bytes-a");
        ledger
            .record(&fingerprint, Utc::now(), "media-old")
            .await
            .unwrap();

        let photos = FlakyLibrary::reliable();
        let coordinator = UploadCoordinator::new(&photos, &ledger, &upload_config(3));

        let (_, outcome) = coordinator
            .upload(record("a.jpg", b"bytes-a"), &album())
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            UploadOutcome::Skipped {
                reason: SkipReason::Duplicate
            }
        ));
        assert_eq!(photos.upload_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_same_run_duplicates_resolve_one_uploaded_one_skipped() {
        let ledger = coordinator_parts().await;
        let photos = FlakyLibrary::reliable();
        let coordinator = UploadCoordinator::new(&photos, &ledger, &upload_config(3));

        // Identical bytes, different filenames.
        let (_, first) = coordinator
            .upload(record("a.jpg", b"same-bytes"), &album())
            .await
            .unwrap();
        let (_, second) = coordinator
            .upload(record("b.jpg", b"same-bytes"), &album())
            .await
            .unwrap();

        assert!(matches!(first, UploadOutcome::Uploaded { .. }));
        assert!(matches!(second, UploadOutcome::Skipped { .. }));
        assert_eq!(photos.upload_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transient_failures_retried_to_success() {
        let ledger = coordinator_parts().await;
        let photos = FlakyLibrary::failing(2, PhotoError::Transient("503".to_string()));
        let coordinator = UploadCoordinator::new(&photos, &ledger, &upload_config(3));

        let (_, outcome) = coordinator
            .upload(record("a.jpg", b"bytes-a"), &album())
            .await
            .unwrap();

        assert!(matches!(outcome, UploadOutcome::Uploaded { .. }));
        assert_eq!(photos.upload_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retries_exhausted_is_transient_failure() {
        let ledger = coordinator_parts().await;
        let photos = FlakyLibrary::failing(99, PhotoError::Transient("503".to_string()));
        let coordinator = UploadCoordinator::new(&photos, &ledger, &upload_config(3));

        let (fingerprint, outcome) = coordinator
            .upload(record("a.jpg", b"bytes-a"), &album())
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            UploadOutcome::Failed {
                kind: FailureKind::Transient,
                ..
            }
        ));
        assert_eq!(photos.upload_calls.load(Ordering::SeqCst), 3);
        assert!(ledger.is_new(&fingerprint).await.unwrap());
    }

    #[tokio::test]
    async fn test_permanent_failure_not_retried() {
        let ledger = coordinator_parts().await;
        let photos = FlakyLibrary::failing(99, PhotoError::Permanent("quota".to_string()));
        let coordinator = UploadCoordinator::new(&photos, &ledger, &upload_config(5));

        let (_, outcome) = coordinator
            .upload(record("a.jpg", b"bytes-a"), &album())
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            UploadOutcome::Failed {
                kind: FailureKind::Permanent,
                ..
            }
        ));
        assert_eq!(photos.upload_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_album_association_failure_is_permanent_and_unrecorded() {
        let ledger = coordinator_parts().await;
        let mut photos = FlakyLibrary::reliable();
        photos.album_fails = true;
        let coordinator = UploadCoordinator::new(&photos, &ledger, &upload_config(3));

        let (fingerprint, outcome) = coordinator
            .upload(record("a.jpg", b"bytes-a"), &album())
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            UploadOutcome::Failed {
                kind: FailureKind::Permanent,
                ..
            }
        ));
        // Not recorded, so the next run retries it.
        assert!(ledger.is_new(&fingerprint).await.unwrap());
    }

    fn upload_config(max_attempts: u32) -> UploadConfig {
        let toml = format!(
            r#"
            album_name = "School Photos"
            max_upload_attempts = {max_attempts}
            "#
        );
        toml::from_str(&toml).unwrap()
    }
}
