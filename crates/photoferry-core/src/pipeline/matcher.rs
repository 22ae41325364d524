//! Candidate message matching.

use chrono::{DateTime, Datelike, Duration, FixedOffset, Utc, Weekday};
use tracing::{debug, info, warn};

use photoferry_imap::Uid;
use photoferry_mime::Message;

use crate::Result;
use crate::config::Config;
use crate::service::{Mailbox, SearchQuery};

/// A mailbox message whose sender and subject match the configured filters.
#[derive(Debug, Clone)]
pub struct CandidateMessage {
    /// Mailbox-assigned identifier.
    pub uid: Uid,
    /// Sender address, as extracted from the From header.
    pub sender: String,
    /// Decoded subject line.
    pub subject: String,
    /// Parsed Date header, when present and well-formed. Advisory only.
    pub date: Option<DateTime<FixedOffset>>,
    /// Raw RFC 822 bytes, handed to the extractor.
    pub raw: Vec<u8>,
}

/// Matching rules for candidate selection.
#[derive(Debug, Clone)]
pub struct MatchRule {
    /// Address the messages must come from (case-insensitive).
    pub sender: String,
    /// Subject line the messages must carry, character for character.
    ///
    /// Exact equality, not substring or pattern matching: the upstream sender
    /// emits one fixed subject line, and anything else is unrelated mail.
    pub subject_pattern: String,
    /// Days back from now to search.
    pub lookback_days: u32,
    /// Matching messages a normal window is expected to contain. Advisory.
    pub expected_weekly_messages: u32,
}

impl MatchRule {
    /// Builds the rule from run configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            sender: config.mailbox.sender_email.clone(),
            subject_pattern: config.filter.subject_pattern.clone(),
            lookback_days: config.filter.lookback_days,
            expected_weekly_messages: config.filter.expected_weekly_messages,
        }
    }
}

/// Searches the mailbox and returns messages matching the rule.
///
/// The server-side search is by sender and date only; subject equality is
/// checked locally on the fetched headers. Messages that cannot be fetched or
/// whose headers cannot be parsed are skipped with a warning; an empty result
/// is not an error.
///
/// # Errors
///
/// Returns a fatal error if the search itself fails; no partial candidate
/// list is trusted.
pub async fn find_candidates<M: Mailbox>(
    mailbox: &mut M,
    rule: &MatchRule,
) -> Result<Vec<CandidateMessage>> {
    let since = Utc::now() - Duration::days(i64::from(rule.lookback_days));
    let query = SearchQuery {
        sender: rule.sender.clone(),
        since,
    };

    let uids = mailbox.search(&query).await?;
    info!(
        sender = %rule.sender,
        lookback_days = rule.lookback_days,
        found = uids.len(),
        "Mailbox search completed"
    );

    let mut candidates = Vec::new();

    for uid in uids {
        let raw = match mailbox.fetch(uid).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                warn!(%uid, "Message vanished between search and fetch");
                continue;
            }
            Err(e) => {
                warn!(%uid, error = %e, "Failed to fetch message; skipping");
                continue;
            }
        };

        let headers = match Message::parse_headers(&raw) {
            Ok(headers) => headers,
            Err(e) => {
                warn!(%uid, error = %e, "Unparseable message headers; skipping");
                continue;
            }
        };

        let from = headers.get_decoded("from").unwrap_or_default();
        let sender = address_of(&from).to_string();
        if !sender.eq_ignore_ascii_case(&rule.sender) {
            debug!(%uid, %sender, "Sender mismatch");
            continue;
        }

        let subject = headers.get_decoded("subject").unwrap_or_default();
        if subject != rule.subject_pattern {
            debug!(%uid, %subject, "Subject does not match pattern exactly");
            continue;
        }

        let date = headers
            .get("date")
            .and_then(|d| DateTime::parse_from_rfc2822(d).ok());

        candidates.push(CandidateMessage {
            uid,
            sender,
            subject,
            date,
            raw,
        });
    }

    log_expectation(&candidates, rule.expected_weekly_messages);
    Ok(candidates)
}

/// Logs how the candidate set compares to the expected weekly pattern.
///
/// The upstream sender normally posts a fixed number of messages on Fridays;
/// a differing count is worth a log line but is never a correctness gate.
fn log_expectation(candidates: &[CandidateMessage], expected: u32) {
    let friday_count = candidates
        .iter()
        .filter(|c| c.date.is_some_and(|d| d.weekday() == Weekday::Fri))
        .count();

    if friday_count == expected as usize {
        info!(friday_count, "Found the expected number of Friday messages");
    } else {
        warn!(
            friday_count,
            expected, "Friday message count differs from the expected pattern"
        );
    }
}

/// Extracts the address part of a From header (`Name <addr>` or bare `addr`).
fn address_of(from: &str) -> &str {
    if let (Some(open), Some(close)) = (from.find('<'), from.rfind('>'))
        && open < close
    {
        from[open + 1..close].trim()
    } else {
        from.trim()
    }
}
