//! MIME message parsing.

use crate::content_type::ContentType;
use crate::disposition::ContentDisposition;
use crate::encoding::{decode_base64, decode_quoted_printable_bytes, decode_rfc2047};
use crate::error::{Error, Result};
use crate::header::Headers;
use std::fmt;

/// Maximum multipart nesting depth accepted before a message is considered
/// malformed.
const MAX_NESTING_DEPTH: usize = 8;

/// Transfer encoding types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEncoding {
    /// 7-bit ASCII.
    SevenBit,
    /// 8-bit binary.
    EightBit,
    /// Base64 encoding.
    Base64,
    /// Quoted-Printable encoding.
    QuotedPrintable,
    /// Binary (no encoding).
    Binary,
}

impl TransferEncoding {
    /// Parses transfer encoding from string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "8bit" => Self::EightBit,
            "base64" => Self::Base64,
            "quoted-printable" => Self::QuotedPrintable,
            "binary" => Self::Binary,
            _ => Self::SevenBit, // Default (includes "7bit")
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SevenBit => write!(f, "7bit"),
            Self::EightBit => write!(f, "8bit"),
            Self::Base64 => write!(f, "base64"),
            Self::QuotedPrintable => write!(f, "quoted-printable"),
            Self::Binary => write!(f, "binary"),
        }
    }
}

/// A leaf MIME part.
#[derive(Debug, Clone)]
pub struct Part {
    /// Part headers.
    pub headers: Headers,
    /// Part body (raw, still transfer-encoded).
    pub body: Vec<u8>,
}

impl Part {
    /// Creates a new part.
    #[must_use]
    pub const fn new(headers: Headers, body: Vec<u8>) -> Self {
        Self { headers, body }
    }

    /// Gets the content type, defaulting to text/plain when absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the content type header is invalid.
    pub fn content_type(&self) -> Result<ContentType> {
        self.headers
            .get("content-type")
            .map_or_else(|| Ok(ContentType::text_plain()), ContentType::parse)
    }

    /// Gets the content disposition, if the part declares one.
    ///
    /// A malformed disposition header is treated as absent.
    #[must_use]
    pub fn disposition(&self) -> Option<ContentDisposition> {
        self.headers
            .get("content-disposition")
            .and_then(|raw| ContentDisposition::parse(raw).ok())
    }

    /// Checks whether the part is declared as an attachment (not inline body).
    #[must_use]
    pub fn is_attachment(&self) -> bool {
        self.disposition().is_some_and(|d| d.is_attachment())
    }

    /// Returns the part's filename, RFC 2047-decoded.
    ///
    /// Prefers the Content-Disposition filename parameter, falling back to the
    /// legacy Content-Type name parameter.
    #[must_use]
    pub fn filename(&self) -> Option<String> {
        let raw = self
            .disposition()
            .and_then(|d| d.filename().map(ToString::to_string))
            .or_else(|| {
                self.content_type()
                    .ok()
                    .and_then(|ct| ct.name().map(ToString::to_string))
            })?;

        Some(decode_rfc2047(&raw).unwrap_or(raw))
    }

    /// Gets the transfer encoding.
    #[must_use]
    pub fn transfer_encoding(&self) -> TransferEncoding {
        self.headers
            .get("content-transfer-encoding")
            .map_or(TransferEncoding::SevenBit, TransferEncoding::parse)
    }

    /// Decodes the body according to the transfer encoding.
    ///
    /// # Errors
    ///
    /// Returns an error if decoding fails.
    pub fn decode_body(&self) -> Result<Vec<u8>> {
        match self.transfer_encoding() {
            TransferEncoding::Base64 => decode_base64(&String::from_utf8_lossy(&self.body)),
            TransferEncoding::QuotedPrintable => {
                decode_quoted_printable_bytes(&String::from_utf8_lossy(&self.body))
            }
            _ => Ok(self.body.clone()),
        }
    }

    /// Gets the decoded body as a string.
    ///
    /// # Errors
    ///
    /// Returns an error if decoding or UTF-8 conversion fails.
    pub fn body_text(&self) -> Result<String> {
        let decoded = self.decode_body()?;
        String::from_utf8(decoded).map_err(Into::into)
    }
}

/// A parsed MIME message.
///
/// Multipart bodies are flattened at parse time: `parts` holds the leaf parts
/// in document order, with nested multipart containers expanded in place.
#[derive(Debug, Clone)]
pub struct Message {
    /// Message headers.
    pub headers: Headers,
    /// Leaf parts (empty for single-part messages).
    pub parts: Vec<Part>,
    /// Body for single-part messages.
    pub body: Option<Vec<u8>>,
}

impl Message {
    /// Parses a raw RFC 822 message.
    ///
    /// # Errors
    ///
    /// Returns an error if the message structure cannot be parsed (missing
    /// multipart boundary, nesting too deep, unparseable headers).
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let (header_text, body) = split_headers_body(raw);
        let headers = Headers::parse(&header_text)?;

        let content_type = headers
            .get("content-type")
            .map_or_else(|| Ok(ContentType::text_plain()), ContentType::parse)?;

        if content_type.is_multipart() {
            let boundary = content_type.boundary().ok_or(Error::MissingBoundary)?;
            let parts = parse_multipart(&body, boundary, 1)?;
            Ok(Self {
                headers,
                parts,
                body: None,
            })
        } else {
            Ok(Self {
                headers,
                parts: Vec::new(),
                body: Some(body),
            })
        }
    }

    /// Parses only the header section of a raw message.
    ///
    /// Cheaper than [`Message::parse`] when the body is not needed, e.g. for
    /// filtering by sender and subject before committing to a full parse.
    ///
    /// # Errors
    ///
    /// Returns an error if the header section cannot be parsed.
    pub fn parse_headers(raw: &[u8]) -> Result<Headers> {
        let header_end = find_subslice(raw, b"\r\n\r\n")
            .or_else(|| find_subslice(raw, b"\n\n"))
            .unwrap_or(raw.len());
        Headers::parse(&String::from_utf8_lossy(&raw[..header_end]))
    }

    /// Gets the From header, RFC 2047-decoded.
    #[must_use]
    pub fn from(&self) -> Option<String> {
        self.headers.get_decoded("from")
    }

    /// Gets the Subject header, RFC 2047-decoded.
    #[must_use]
    pub fn subject(&self) -> Option<String> {
        self.headers.get_decoded("subject")
    }

    /// Gets the Date header.
    #[must_use]
    pub fn date(&self) -> Option<&str> {
        self.headers.get("date")
    }

    /// Checks if this is a multipart message.
    #[must_use]
    pub fn is_multipart(&self) -> bool {
        !self.parts.is_empty()
    }
}

/// Splits a raw message into header text and body bytes at the first blank
/// line.
fn split_headers_body(raw: &[u8]) -> (String, Vec<u8>) {
    if let Some(idx) = find_subslice(raw, b"\r\n\r\n") {
        (
            String::from_utf8_lossy(&raw[..idx]).into_owned(),
            raw[idx + 4..].to_vec(),
        )
    } else if let Some(idx) = find_subslice(raw, b"\n\n") {
        (
            String::from_utf8_lossy(&raw[..idx]).into_owned(),
            raw[idx + 2..].to_vec(),
        )
    } else {
        (String::from_utf8_lossy(raw).into_owned(), Vec::new())
    }
}

/// Parses a multipart body into leaf parts, expanding nested multiparts.
fn parse_multipart(body: &[u8], boundary: &str, depth: usize) -> Result<Vec<Part>> {
    if depth > MAX_NESTING_DEPTH {
        return Err(Error::InvalidMultipart(format!(
            "Nesting exceeds {MAX_NESTING_DEPTH} levels"
        )));
    }

    let mut parts = Vec::new();

    for chunk in split_multipart(body, boundary) {
        let (header_text, part_body) = split_headers_body(chunk);
        let headers = Headers::parse(&header_text)?;

        let content_type = headers
            .get("content-type")
            .map_or_else(|| Ok(ContentType::text_plain()), ContentType::parse)?;

        if content_type.is_multipart() {
            let nested_boundary = content_type.boundary().ok_or(Error::MissingBoundary)?;
            parts.extend(parse_multipart(&part_body, nested_boundary, depth + 1)?);
        } else {
            parts.push(Part::new(headers, part_body));
        }
    }

    Ok(parts)
}

/// Splits a multipart body into raw part chunks using the boundary delimiter.
fn split_multipart<'a>(body: &'a [u8], boundary: &str) -> Vec<&'a [u8]> {
    let delimiter = format!("--{boundary}");
    let delimiter = delimiter.as_bytes();

    let mut chunks = Vec::new();
    let mut pos = 0;
    let mut part_start: Option<usize> = None;

    while let Some(rel) = find_subslice(&body[pos..], delimiter) {
        let hit = pos + rel;

        if let Some(start) = part_start {
            // Strip the CRLF that precedes the delimiter line.
            let mut end = hit;
            if end > start && body[end - 1] == b'\n' {
                end -= 1;
            }
            if end > start && body[end - 1] == b'\r' {
                end -= 1;
            }
            if end > start {
                chunks.push(&body[start..end]);
            }
        }

        let after = hit + delimiter.len();

        // Closing delimiter "--boundary--" terminates the body.
        if body[after..].starts_with(b"--") {
            return chunks;
        }

        // Skip the rest of the delimiter line.
        let mut start = after;
        if body[start..].starts_with(b"\r\n") {
            start += 2;
        } else if body[start..].starts_with(b"\n") {
            start += 1;
        }

        part_start = Some(start);
        pos = start;
    }

    // Unterminated final part; accept what we have.
    if let Some(start) = part_start
        && start < body.len()
    {
        chunks.push(&body[start..]);
    }

    chunks
}

/// Finds the first occurrence of `needle` in `haystack`.
fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn multipart_fixture() -> Vec<u8> {
        concat!(
            "From: school@example.com\r\n",
            "Subject: [School ]\r\n",
            "Content-Type: multipart/mixed; boundary=\"XYZ\"\r\n",
            "\r\n",
            "--XYZ\r\n",
            "Content-Type: text/plain\r\n",
            "\r\n",
            "See attached photos.\r\n",
            "--XYZ\r\n",
            "Content-Type: image/jpeg; name=\"friday.jpg\"\r\n",
            "Content-Disposition: attachment; filename=\"friday.jpg\"\r\n",
            "Content-Transfer-Encoding: base64\r\n",
            "\r\n",
            "/9j/4AAQ\r\n",
            "--XYZ--\r\n",
        )
        .as_bytes()
        .to_vec()
    }

    #[test]
    fn test_parse_headers_only() {
        let headers = Message::parse_headers(&multipart_fixture()).unwrap();
        assert_eq!(headers.get_decoded("subject"), Some("[School ]".to_string()));
        assert_eq!(
            headers.get_decoded("from"),
            Some("school@example.com".to_string())
        );
    }

    #[test]
    fn test_parse_single_part() {
        let raw = b"From: a@b.com\r\nSubject: Hi\r\n\r\nHello!";
        let message = Message::parse(raw).unwrap();
        assert_eq!(message.subject(), Some("Hi".to_string()));
        assert!(!message.is_multipart());
        assert_eq!(message.body.as_deref(), Some(b"Hello!".as_slice()));
    }

    #[test]
    fn test_parse_multipart() {
        let message = Message::parse(&multipart_fixture()).unwrap();
        assert_eq!(message.parts.len(), 2);
        assert_eq!(message.subject(), Some("[School ]".to_string()));

        let text = &message.parts[0];
        assert!(!text.is_attachment());
        assert_eq!(text.body_text().unwrap(), "See attached photos.");

        let image = &message.parts[1];
        assert!(image.is_attachment());
        assert_eq!(image.filename(), Some("friday.jpg".to_string()));
        assert_eq!(image.decode_body().unwrap(), decode_base64("/9j/4AAQ").unwrap());
    }

    #[test]
    fn test_parse_nested_multipart_flattens() {
        let raw = concat!(
            "Content-Type: multipart/mixed; boundary=\"outer\"\r\n",
            "\r\n",
            "--outer\r\n",
            "Content-Type: multipart/alternative; boundary=\"inner\"\r\n",
            "\r\n",
            "--inner\r\n",
            "Content-Type: text/plain\r\n",
            "\r\n",
            "plain\r\n",
            "--inner\r\n",
            "Content-Type: text/html\r\n",
            "\r\n",
            "<p>html</p>\r\n",
            "--inner--\r\n",
            "--outer\r\n",
            "Content-Disposition: attachment; filename=\"a.png\"\r\n",
            "Content-Type: image/png\r\n",
            "\r\n",
            "PNGDATA\r\n",
            "--outer--\r\n",
        )
        .as_bytes();

        let message = Message::parse(raw).unwrap();
        assert_eq!(message.parts.len(), 3);
        assert_eq!(message.parts[2].filename(), Some("a.png".to_string()));
    }

    #[test]
    fn test_parse_multipart_missing_boundary() {
        let raw = b"Content-Type: multipart/mixed\r\n\r\nbody";
        assert!(matches!(
            Message::parse(raw),
            Err(Error::MissingBoundary)
        ));
    }

    #[test]
    fn test_filename_falls_back_to_content_type_name() {
        let mut headers = Headers::new();
        headers.add("content-type", "image/jpeg; name=\"legacy.jpg\"");
        let part = Part::new(headers, Vec::new());
        assert_eq!(part.filename(), Some("legacy.jpg".to_string()));
    }

    #[test]
    fn test_filename_rfc2047_decoded() {
        let mut headers = Headers::new();
        headers.add(
            "content-disposition",
            "attachment; filename=\"=?utf-8?B?Zm90by5qcGc=?=\"",
        );
        let part = Part::new(headers, Vec::new());
        assert_eq!(part.filename(), Some("foto.jpg".to_string()));
    }

    #[test]
    fn test_quoted_printable_part_body() {
        let mut headers = Headers::new();
        headers.add("content-transfer-encoding", "quoted-printable");
        let part = Part::new(headers, b"caf=C3=A9".to_vec());
        assert_eq!(part.body_text().unwrap(), "café");
    }

    #[test]
    fn test_transfer_encoding_parse() {
        assert_eq!(TransferEncoding::parse("7bit"), TransferEncoding::SevenBit);
        assert_eq!(TransferEncoding::parse("BASE64"), TransferEncoding::Base64);
        assert_eq!(
            TransferEncoding::parse("quoted-printable"),
            TransferEncoding::QuotedPrintable
        );
    }
}
