//! Attachment extraction and validation.

use tracing::{debug, warn};

use photoferry_imap::Uid;
use photoferry_mime::{Message, Part};

use super::matcher::CandidateMessage;
use crate::config::Config;

/// A validated image attachment, bytes owned until its upload outcome is
/// known.
#[derive(Debug, Clone)]
pub struct AttachmentRecord {
    /// Original filename from the MIME part.
    pub filename: String,
    /// Decoded attachment bytes.
    pub content: Vec<u8>,
    /// Declared MIME type.
    pub mime_type: String,
    /// Decoded size in bytes.
    pub size: u64,
    /// UID of the message the attachment came from.
    pub message_uid: Uid,
}

/// Extraction failure for a whole message.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// The message structure itself cannot be parsed. Per-message: the caller
    /// skips the message and continues with the rest of the run.
    #[error("Corrupt message: {0}")]
    CorruptMessage(String),
}

/// Validation rules for attachment parts.
#[derive(Debug, Clone)]
pub struct ExtractRule {
    /// Accepted filename extensions, lowercase with leading dot.
    pub supported_formats: Vec<String>,
    /// Largest accepted decoded size in bytes.
    pub max_file_size: u64,
}

impl ExtractRule {
    /// Builds the rule from run configuration, normalizing extensions.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            supported_formats: config
                .uploads
                .supported_formats
                .iter()
                .map(|f| f.to_lowercase())
                .collect(),
            max_file_size: config.uploads.max_file_size_bytes(),
        }
    }

    fn is_supported(&self, extension: &str) -> bool {
        self.supported_formats.iter().any(|f| f == extension)
    }
}

/// Result of extracting one message.
#[derive(Debug, Default)]
pub struct Extraction {
    /// Attachments that passed every check.
    pub accepted: Vec<AttachmentRecord>,
    /// Attachment parts excluded by type, size, or emptiness checks.
    /// Diagnostic only; rejections never abort sibling extraction.
    pub rejected: u32,
}

/// Extracts validated image attachments from a candidate message.
///
/// A part is accepted only when it is declared an attachment, carries a
/// filename whose extension is in the supported set, decodes without error,
/// and its decoded size is within bounds and non-zero. Failing parts are
/// logged and counted, nothing more.
///
/// # Errors
///
/// Returns [`ExtractError::CorruptMessage`] only when the message structure
/// cannot be parsed at all.
pub fn extract(message: &CandidateMessage, rule: &ExtractRule) -> Result<Extraction, ExtractError> {
    let parsed =
        Message::parse(&message.raw).map_err(|e| ExtractError::CorruptMessage(e.to_string()))?;

    let uid = message.uid;
    let mut extraction = Extraction::default();

    // A single-part message can itself be an attachment-disposed image.
    let parts: Vec<Part> = if parsed.is_multipart() {
        parsed.parts
    } else {
        vec![Part::new(
            parsed.headers.clone(),
            parsed.body.unwrap_or_default(),
        )]
    };

    for part in &parts {
        if !part.is_attachment() {
            continue;
        }

        let Some(filename) = part.filename() else {
            debug!(%uid, "Attachment part without filename; excluded");
            extraction.rejected += 1;
            continue;
        };

        let extension = extension_of(&filename);
        if !rule.is_supported(&extension) {
            debug!(%uid, filename, "Unsupported attachment type; excluded");
            extraction.rejected += 1;
            continue;
        }

        let content = match part.decode_body() {
            Ok(content) => content,
            Err(e) => {
                warn!(%uid, filename, error = %e, "Undecodable attachment body; excluded");
                extraction.rejected += 1;
                continue;
            }
        };

        let size = content.len() as u64;
        if size == 0 {
            debug!(%uid, filename, "Empty attachment; excluded");
            extraction.rejected += 1;
            continue;
        }
        if size > rule.max_file_size {
            warn!(%uid, filename, size, "Attachment exceeds size limit; excluded");
            extraction.rejected += 1;
            continue;
        }

        let mime_type = part
            .content_type()
            .map_or_else(|_| "application/octet-stream".to_string(), |ct| {
                format!("{}/{}", ct.main_type, ct.sub_type)
            });

        debug!(%uid, filename, size, "Accepted attachment");
        extraction.accepted.push(AttachmentRecord {
            filename,
            content,
            mime_type,
            size,
            message_uid: uid,
        });
    }

    Ok(extraction)
}

/// The lowercase extension of a filename, leading dot included.
fn extension_of(filename: &str) -> String {
    filename
        .rfind('.')
        .map(|idx| filename[idx..].to_lowercase())
        .unwrap_or_default()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;

    fn rule() -> ExtractRule {
        ExtractRule {
            supported_formats: vec![".jpg".to_string(), ".png".to_string()],
            max_file_size: 1024,
        }
    }

    fn candidate(raw: Vec<u8>) -> CandidateMessage {
        CandidateMessage {
            uid: Uid(7),
            sender: "school@example.com".to_string(),
            subject: "[School ]".to_string(),
            date: None,
            raw,
        }
    }

    fn multipart(parts: &[(&str, &str, &[u8])]) -> Vec<u8> {
        let mut raw = String::from(
            "From: school@example.com\r\n\
             Subject: [School ]\r\n\
             Content-Type: multipart/mixed; boundary=\"B\"\r\n\r\n",
        );
        for (filename, content_type, body) in parts {
            raw.push_str("--B\r\n");
            raw.push_str(&format!("Content-Type: {content_type}\r\n"));
            raw.push_str(&format!(
                "Content-Disposition: attachment; filename=\"{filename}\"\r\n"
            ));
            raw.push_str("Content-Transfer-Encoding: base64\r\n\r\n");
            raw.push_str(&STANDARD.encode(body));
            raw.push_str("\r\n");
        }
        raw.push_str("--B--\r\n");
        raw.into_bytes()
    }

    #[test]
    fn test_valid_attachment_accepted() {
        let raw = multipart(&[("friday.jpg", "image/jpeg", b"jpegbytes")]);
        let extraction = extract(&candidate(raw), &rule()).unwrap();

        assert_eq!(extraction.accepted.len(), 1);
        assert_eq!(extraction.rejected, 0);

        let record = &extraction.accepted[0];
        assert_eq!(record.filename, "friday.jpg");
        assert_eq!(record.content, b"jpegbytes");
        assert_eq!(record.mime_type, "image/jpeg");
        assert_eq!(record.size, 9);
        assert_eq!(record.message_uid, Uid(7));
    }

    #[test]
    fn test_unsupported_extension_excluded_without_aborting_siblings() {
        let raw = multipart(&[
            ("notes.pdf", "application/pdf", b"pdfbytes"),
            ("friday.jpg", "image/jpeg", b"jpegbytes"),
        ]);
        let extraction = extract(&candidate(raw), &rule()).unwrap();

        assert_eq!(extraction.accepted.len(), 1);
        assert_eq!(extraction.accepted[0].filename, "friday.jpg");
        assert_eq!(extraction.rejected, 1);
    }

    #[test]
    fn test_oversized_attachment_excluded() {
        let big = vec![0u8; 2048];
        let raw = multipart(&[("big.png", "image/png", &big)]);
        let extraction = extract(&candidate(raw), &rule()).unwrap();

        assert!(extraction.accepted.is_empty());
        assert_eq!(extraction.rejected, 1);
    }

    #[test]
    fn test_empty_attachment_excluded() {
        let raw = multipart(&[("empty.jpg", "image/jpeg", b"")]);
        let extraction = extract(&candidate(raw), &rule()).unwrap();

        assert!(extraction.accepted.is_empty());
        assert_eq!(extraction.rejected, 1);
    }

    #[test]
    fn test_extension_check_case_insensitive() {
        let raw = multipart(&[("FRIDAY.JPG", "image/jpeg", b"jpegbytes")]);
        let extraction = extract(&candidate(raw), &rule()).unwrap();
        assert_eq!(extraction.accepted.len(), 1);
    }

    #[test]
    fn test_inline_parts_ignored_silently() {
        let raw = concat!(
            "Content-Type: multipart/mixed; boundary=\"B\"\r\n\r\n",
            "--B\r\n",
            "Content-Type: text/plain\r\n\r\n",
            "See the photos!\r\n",
            "--B--\r\n",
        )
        .as_bytes()
        .to_vec();
        let extraction = extract(&candidate(raw), &rule()).unwrap();

        assert!(extraction.accepted.is_empty());
        assert_eq!(extraction.rejected, 0);
    }

    #[test]
    fn test_corrupt_message_errors() {
        let raw = b"Content-Type: multipart/mixed\r\n\r\nno boundary".to_vec();
        let result = extract(&candidate(raw), &rule());
        assert!(matches!(result, Err(ExtractError::CorruptMessage(_))));
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("a.JPG"), ".jpg");
        assert_eq!(extension_of("archive.tar.gz"), ".gz");
        assert_eq!(extension_of("noext"), "");
    }
}
