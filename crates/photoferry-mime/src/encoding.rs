//! MIME decoding utilities.
//!
//! Supports Base64, Quoted-Printable, and RFC 2047 header decoding. This
//! crate only reads mail, so the generation side of each encoding is not
//! implemented.

use crate::error::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Decodes Base64 data.
///
/// Whitespace is stripped before decoding so folded body lines are accepted.
///
/// # Errors
///
/// Returns an error if the input is not valid Base64.
pub fn decode_base64(data: &str) -> Result<Vec<u8>> {
    let cleaned: String = data.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD.decode(cleaned).map_err(Into::into)
}

/// Decodes Quoted-Printable data to raw bytes (RFC 2045).
///
/// Byte-level so that binary attachment bodies survive decoding.
///
/// # Errors
///
/// Returns an error if the input contains an incomplete or invalid escape
/// sequence.
pub fn decode_quoted_printable_bytes(text: &str) -> Result<Vec<u8>> {
    let mut result = Vec::new();
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '=' {
            // Soft line break
            if chars.peek() == Some(&'\r') {
                chars.next();
                if chars.peek() == Some(&'\n') {
                    chars.next();
                    continue;
                }
            } else if chars.peek() == Some(&'\n') {
                chars.next();
                continue;
            }

            // Hex encoded byte
            let hex: String = chars.by_ref().take(2).collect();
            if hex.len() == 2 {
                let byte = u8::from_str_radix(&hex, 16)
                    .map_err(|e| Error::InvalidEncoding(format!("Invalid hex: {e}")))?;
                result.push(byte);
            } else {
                return Err(Error::InvalidEncoding(
                    "Incomplete escape sequence".to_string(),
                ));
            }
        } else if ch.is_ascii() {
            result.push(ch as u8);
        } else {
            // Raw 8-bit data leaked into a QP body; keep its UTF-8 bytes.
            let mut buf = [0u8; 4];
            result.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
        }
    }

    Ok(result)
}

/// Decodes Quoted-Printable text (RFC 2045).
///
/// # Errors
///
/// Returns an error if the input contains invalid escape sequences or the
/// decoded bytes are not UTF-8.
pub fn decode_quoted_printable(text: &str) -> Result<String> {
    let bytes = decode_quoted_printable_bytes(text)?;
    String::from_utf8(bytes).map_err(Into::into)
}

/// Decodes a header value containing RFC 2047 encoded words.
///
/// Format: `=?charset?encoding?encoded-text?=`. Plain text segments between
/// encoded words are passed through; whitespace between two adjacent encoded
/// words is dropped per the RFC. Unknown charsets are decoded as UTF-8.
///
/// # Errors
///
/// Returns an error if an encoded word carries invalid Base64 or
/// Quoted-Printable content.
pub fn decode_rfc2047(value: &str) -> Result<String> {
    let mut result = String::new();
    let mut rest = value;
    let mut last_was_encoded = false;

    while let Some(start) = rest.find("=?") {
        let (before, tail) = rest.split_at(start);

        let Some((word, after)) = parse_encoded_word(tail) else {
            // Not a well-formed encoded word; emit literally and move on.
            result.push_str(before);
            result.push_str("=?");
            rest = &tail[2..];
            last_was_encoded = false;
            continue;
        };

        // Whitespace between adjacent encoded words is ignored.
        if !(before.chars().all(char::is_whitespace) && last_was_encoded) {
            result.push_str(before);
        }

        result.push_str(&decode_encoded_word(word)?);
        last_was_encoded = true;
        rest = after;
    }

    result.push_str(rest);
    Ok(result)
}

/// A single RFC 2047 encoded word split into its fields.
struct EncodedWord<'a> {
    encoding: &'a str,
    text: &'a str,
}

/// Splits `=?charset?enc?text?=` off the front of `input`.
fn parse_encoded_word(input: &str) -> Option<(EncodedWord<'_>, &str)> {
    let inner = input.strip_prefix("=?")?;
    let (_charset, rest) = inner.split_once('?')?;
    let (encoding, rest) = rest.split_once('?')?;
    let (text, after) = rest.split_once("?=")?;

    if encoding.len() != 1 {
        return None;
    }

    Some((EncodedWord { encoding, text }, after))
}

fn decode_encoded_word(word: EncodedWord<'_>) -> Result<String> {
    match word.encoding {
        "B" | "b" => {
            let bytes = decode_base64(word.text)?;
            String::from_utf8(bytes).map_err(Into::into)
        }
        "Q" | "q" => {
            // Q encoding is QP with underscore standing in for space.
            let unescaped = word.text.replace('_', " ");
            decode_quoted_printable(&unescaped)
        }
        other => Err(Error::InvalidEncoding(format!(
            "Unknown RFC 2047 encoding: {other}"
        ))),
    }
}
