//! MIME header handling.

use crate::encoding::decode_rfc2047;
use crate::error::Result;
use std::collections::HashMap;

/// Collection of email headers.
#[derive(Debug, Clone, Default)]
pub struct Headers {
    headers: HashMap<String, Vec<String>>,
}

impl Headers {
    /// Creates a new empty header collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a header value.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into().to_lowercase();
        self.headers.entry(name).or_default().push(value.into());
    }

    /// Gets the first value for a header.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_lowercase())
            .and_then(|v| v.first().map(String::as_str))
    }

    /// Gets the first value for a header with RFC 2047 encoded words decoded.
    ///
    /// Malformed encoded words fall back to the raw value rather than erroring,
    /// since header cosmetics must never abort message processing.
    #[must_use]
    pub fn get_decoded(&self, name: &str) -> Option<String> {
        self.get(name)
            .map(|raw| decode_rfc2047(raw).unwrap_or_else(|_| raw.to_string()))
    }

    /// Returns an iterator over all headers.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers
            .iter()
            .flat_map(|(name, values)| values.iter().map(move |v| (name.as_str(), v.as_str())))
    }

    /// Parses headers from raw text.
    ///
    /// Continuation lines (leading space or tab) are unfolded into the
    /// previous header's value.
    ///
    /// # Errors
    ///
    /// Returns an error if header format is invalid.
    pub fn parse(text: &str) -> Result<Self> {
        let mut headers = Self::new();
        let mut current_name: Option<String> = None;
        let mut current_value = String::new();

        for line in text.lines() {
            if line.is_empty() {
                break;
            }

            if line.starts_with(' ') || line.starts_with('\t') {
                if current_name.is_some() {
                    current_value.push(' ');
                    current_value.push_str(line.trim());
                }
            } else {
                if let Some(name) = current_name.take() {
                    headers.add(name, current_value.trim().to_string());
                    current_value.clear();
                }

                if let Some((name, value)) = line.split_once(':') {
                    current_name = Some(name.trim().to_string());
                    current_value = value.trim().to_string();
                }
            }
        }

        if let Some(name) = current_name {
            headers.add(name, current_value.trim().to_string());
        }

        Ok(headers)
    }
}
