//! MIME content disposition handling (RFC 2183).

use crate::error::{Error, Result};
use std::collections::HashMap;

/// Disposition type of a MIME part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispositionType {
    /// Part is inline body content.
    Inline,
    /// Part is an attachment.
    Attachment,
    /// Extension disposition type we don't recognize.
    Other,
}

/// MIME content disposition with parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDisposition {
    /// Disposition type.
    pub disposition: DispositionType,
    /// Parameters (e.g., filename=photo.jpg).
    pub parameters: HashMap<String, String>,
}

impl ContentDisposition {
    /// Returns the filename parameter if present.
    #[must_use]
    pub fn filename(&self) -> Option<&str> {
        self.parameters.get("filename").map(String::as_str)
    }

    /// Checks if the part is declared as an attachment.
    #[must_use]
    pub const fn is_attachment(&self) -> bool {
        matches!(self.disposition, DispositionType::Attachment)
    }

    /// Parses a content disposition string.
    ///
    /// Format: `attachment; filename="photo.jpg"`
    ///
    /// # Errors
    ///
    /// Returns an error if the value is empty.
    pub fn parse(s: &str) -> Result<Self> {
        let mut parts = s.split(';');

        let disposition_str = parts
            .next()
            .ok_or_else(|| Error::InvalidDisposition("Empty disposition".to_string()))?
            .trim()
            .to_lowercase();

        if disposition_str.is_empty() {
            return Err(Error::InvalidDisposition("Empty disposition".to_string()));
        }

        let disposition = match disposition_str.as_str() {
            "inline" => DispositionType::Inline,
            "attachment" => DispositionType::Attachment,
            _ => DispositionType::Other,
        };

        let mut parsed = Self {
            disposition,
            parameters: HashMap::new(),
        };

        for param in parts {
            let param = param.trim();
            if let Some((key, value)) = param.split_once('=') {
                let key = key.trim().to_lowercase();
                let value = value.trim().trim_matches('"').to_string();
                parsed.parameters.insert(key, value);
            }
        }

        Ok(parsed)
    }
}
