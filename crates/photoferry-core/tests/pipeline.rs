//! End-to-end pipeline runs against fake collaborators.

#![allow(clippy::unwrap_used)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use photoferry_core::service::{
    AlbumHandle, Mailbox, MailboxError, MediaHandle, PhotoError, PhotoLibrary, SearchQuery,
};
use photoferry_core::{Config, DedupLedger, pipeline};
use photoferry_imap::Uid;

struct FakeMailbox {
    messages: Vec<(Uid, Vec<u8>)>,
}

impl Mailbox for FakeMailbox {
    async fn search(&mut self, _query: &SearchQuery) -> Result<Vec<Uid>, MailboxError> {
        Ok(self.messages.iter().map(|(uid, _)| *uid).collect())
    }

    async fn fetch(&mut self, uid: Uid) -> Result<Option<Vec<u8>>, MailboxError> {
        Ok(self
            .messages
            .iter()
            .find(|(u, _)| *u == uid)
            .map(|(_, raw)| raw.clone()))
    }
}

#[derive(Default)]
struct FakePhotoLibrary {
    uploaded: Mutex<Vec<String>>,
    albums: Mutex<HashMap<String, Vec<String>>>,
    album_association_fails: AtomicBool,
}

impl PhotoLibrary for FakePhotoLibrary {
    async fn ensure_album(&self, title: &str) -> Result<AlbumHandle, PhotoError> {
        self.albums
            .lock()
            .unwrap()
            .entry(title.to_string())
            .or_default();
        Ok(AlbumHandle(title.to_string()))
    }

    async fn upload_bytes(
        &self,
        _content: &[u8],
        filename: &str,
    ) -> Result<MediaHandle, PhotoError> {
        let mut uploaded = self.uploaded.lock().unwrap();
        uploaded.push(filename.to_string());
        Ok(MediaHandle(format!("media-{}", uploaded.len())))
    }

    async fn add_to_album(
        &self,
        album: &AlbumHandle,
        media: &MediaHandle,
    ) -> Result<(), PhotoError> {
        if self.album_association_fails.load(Ordering::SeqCst) {
            return Err(PhotoError::Permanent("album gone".to_string()));
        }
        self.albums
            .lock()
            .unwrap()
            .entry(album.0.clone())
            .or_default()
            .push(media.0.clone());
        Ok(())
    }
}

fn config() -> Config {
    Config::from_toml(
        r#"
        [mailbox]
        host = "imap.example.com"
        username = "me@example.com"
        password = "pw"
        sender_email = "school@example.com"

        [filter]
        subject_pattern = "[School ]"

        [uploads]
        album_name = "School Photos"
        max_file_size_mb = 1

        [ledger]
        path = "unused-in-tests.sqlite"

        [photos]
        client_id = "id"
        client_secret = "secret"
        refresh_token = "rt"
        "#,
    )
    .unwrap()
}

fn attachment_part(filename: &str, content_type: &str, body: &[u8]) -> String {
    format!(
        "--B\r\n\
         Content-Type: {content_type}\r\n\
         Content-Disposition: attachment; filename=\"{filename}\"\r\n\
         Content-Transfer-Encoding: base64\r\n\
         \r\n\
         {}\r\n",
        STANDARD.encode(body)
    )
}

fn school_message(parts: &[String]) -> Vec<u8> {
    let mut raw = String::from(
        "From: School <school@example.com>\r\n\
         Subject: [School ]\r\n\
         Date: Fri, 31 Jul 2026 18:46:00 +0000\r\n\
         Content-Type: multipart/mixed; boundary=\"B\"\r\n\
         \r\n",
    );
    for part in parts {
        raw.push_str(part);
    }
    raw.push_str("--B--\r\n");
    raw.into_bytes()
}

/// Two matching messages, each one valid jpg plus one oversized png.
fn friday_mailbox() -> FakeMailbox {
    let oversized = vec![0u8; 1024 * 1024 + 1];
    FakeMailbox {
        messages: vec![
            (
                Uid(1),
                school_message(&[
                    attachment_part("class-a.jpg", "image/jpeg", b"photo content one"),
                    attachment_part("huge-a.png", "image/png", &oversized),
                ]),
            ),
            (
                Uid(2),
                school_message(&[
                    attachment_part("class-b.jpg", "image/jpeg", b"photo content two"),
                    attachment_part("huge-b.png", "image/png", &oversized),
                ]),
            ),
        ],
    }
}

#[tokio::test]
async fn end_to_end_two_messages_with_oversized_siblings() {
    let mut mailbox = friday_mailbox();
    let photos = FakePhotoLibrary::default();
    let ledger = DedupLedger::in_memory().await.unwrap();

    let summary = pipeline::run(&mut mailbox, &photos, &ledger, &config())
        .await
        .unwrap();

    assert_eq!(summary.candidates, 2);
    assert_eq!(summary.extracted, 2);
    assert_eq!(summary.rejected_parts, 2);
    assert_eq!(summary.skipped_duplicates, 0);
    assert_eq!(summary.uploaded, 2);
    assert_eq!(summary.failed(), 0);

    let albums = photos.albums.lock().unwrap();
    assert_eq!(albums.get("School Photos").unwrap().len(), 2);
}

#[tokio::test]
async fn second_run_over_same_window_uploads_nothing() {
    let photos = FakePhotoLibrary::default();
    let ledger = DedupLedger::in_memory().await.unwrap();

    let first = pipeline::run(&mut friday_mailbox(), &photos, &ledger, &config())
        .await
        .unwrap();
    assert_eq!(first.uploaded, 2);

    let second = pipeline::run(&mut friday_mailbox(), &photos, &ledger, &config())
        .await
        .unwrap();
    assert_eq!(second.uploaded, 0);
    assert_eq!(second.skipped_duplicates, 2);
    assert_eq!(second.failed(), 0);

    // The remote service saw exactly two uploads across both runs.
    assert_eq!(photos.uploaded.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn identical_bytes_in_one_run_upload_once() {
    let mut mailbox = FakeMailbox {
        messages: vec![(
            Uid(1),
            school_message(&[
                attachment_part("original.jpg", "image/jpeg", b"identical bytes"),
                attachment_part("renamed.jpg", "image/jpeg", b"identical bytes"),
            ]),
        )],
    };
    let photos = FakePhotoLibrary::default();
    let ledger = DedupLedger::in_memory().await.unwrap();

    let summary = pipeline::run(&mut mailbox, &photos, &ledger, &config())
        .await
        .unwrap();

    assert_eq!(summary.extracted, 2);
    assert_eq!(summary.uploaded, 1);
    assert_eq!(summary.skipped_duplicates, 1);
    assert_eq!(photos.uploaded.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn album_association_failure_leaves_item_retryable_next_run() {
    let photos = FakePhotoLibrary::default();
    let ledger = DedupLedger::in_memory().await.unwrap();

    photos.album_association_fails.store(true, Ordering::SeqCst);
    let first = pipeline::run(&mut friday_mailbox(), &photos, &ledger, &config())
        .await
        .unwrap();
    assert_eq!(first.uploaded, 0);
    assert_eq!(first.failed_permanent, 2);
    assert_eq!(first.failures.len(), 2);

    // Service recovers; the same window now succeeds because nothing was
    // recorded in the ledger.
    photos.album_association_fails.store(false, Ordering::SeqCst);
    let second = pipeline::run(&mut friday_mailbox(), &photos, &ledger, &config())
        .await
        .unwrap();
    assert_eq!(second.uploaded, 2);
    assert_eq!(second.skipped_duplicates, 0);
}

#[tokio::test]
async fn corrupt_message_skipped_others_processed() {
    let mut mailbox = FakeMailbox {
        messages: vec![
            (
                Uid(1),
                // Multipart content type with no boundary: unparseable.
                b"From: school@example.com\r\n\
                  Subject: [School ]\r\n\
                  Content-Type: multipart/mixed\r\n\
                  \r\n\
                  broken"
                    .to_vec(),
            ),
            (
                Uid(2),
                school_message(&[attachment_part("ok.jpg", "image/jpeg", b"fine")]),
            ),
        ],
    };
    let photos = FakePhotoLibrary::default();
    let ledger = DedupLedger::in_memory().await.unwrap();

    let summary = pipeline::run(&mut mailbox, &photos, &ledger, &config())
        .await
        .unwrap();

    assert_eq!(summary.candidates, 2);
    assert_eq!(summary.corrupt_messages, 1);
    assert_eq!(summary.uploaded, 1);
    assert_eq!(summary.failed(), 0);
}

#[tokio::test]
async fn no_candidates_is_successful_empty_run() {
    let mut mailbox = FakeMailbox { messages: vec![] };
    let photos = FakePhotoLibrary::default();
    let ledger = DedupLedger::in_memory().await.unwrap();

    let summary = pipeline::run(&mut mailbox, &photos, &ledger, &config())
        .await
        .unwrap();

    assert_eq!(summary.candidates, 0);
    assert_eq!(summary.uploaded, 0);
    assert!(photos.uploaded.lock().unwrap().is_empty());
}
