//! Mailbox collaborator: trait and IMAP implementation.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use photoferry_imap::{ImapStream, Session, Uid, connect_tls, quote};

use crate::config::MailboxConfig;

/// Errors from the mailbox collaborator.
///
/// All of these are fatal to a run: a mailbox that cannot be searched yields
/// no trustworthy candidate list, so no partial results are used.
#[derive(Debug, thiserror::Error)]
pub enum MailboxError {
    /// Connection could not be established.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Authentication failed.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Search request was rejected.
    #[error("Search failed: {0}")]
    Search(String),

    /// Message fetch failed.
    #[error("Fetch failed: {0}")]
    Fetch(String),
}

/// Server-side search criteria.
///
/// Deliberately narrow: sender and time window only. Subject filtering is
/// applied locally after fetch so exact-match semantics never depend on a
/// server's search implementation.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    /// Sender address to search for.
    pub sender: String,
    /// Lower bound of the search window.
    pub since: DateTime<Utc>,
}

/// A mailbox that can be searched and fetched from.
///
/// The pipeline is tested against fakes implementing this trait; the real
/// implementation is [`ImapMailbox`].
#[allow(async_fn_in_trait)]
pub trait Mailbox {
    /// Returns UIDs of messages matching the query.
    async fn search(&mut self, query: &SearchQuery) -> Result<Vec<Uid>, MailboxError>;

    /// Fetches the raw RFC 822 bytes of a message.
    ///
    /// Returns `None` if the message vanished between search and fetch.
    async fn fetch(&mut self, uid: Uid) -> Result<Option<Vec<u8>>, MailboxError>;
}

/// IMAP-backed mailbox over a logged-in, INBOX-selected session.
pub struct ImapMailbox {
    session: Session<ImapStream>,
}

impl ImapMailbox {
    /// Connects, authenticates, and selects INBOX.
    ///
    /// # Errors
    ///
    /// Returns an error if any step of the connection handshake fails.
    pub async fn connect(config: &MailboxConfig) -> Result<Self, MailboxError> {
        let stream = connect_tls(&config.host, config.port)
            .await
            .map_err(|e| MailboxError::Connection(e.to_string()))?;

        let mut session = Session::new(stream)
            .await
            .map_err(|e| MailboxError::Connection(e.to_string()))?;

        session
            .login(&config.username, &config.password)
            .await
            .map_err(|e| match e {
                photoferry_imap::Error::Auth(msg) => MailboxError::Authentication(msg),
                other => MailboxError::Connection(other.to_string()),
            })?;

        let exists = session
            .select("INBOX")
            .await
            .map_err(|e| MailboxError::Connection(e.to_string()))?;

        debug!(host = %config.host, exists, "Mailbox ready");
        Ok(Self { session })
    }

    /// Logs out, tolerating a server that hangs up first.
    pub async fn disconnect(mut self) {
        if let Err(e) = self.session.logout().await {
            warn!(error = %e, "Error during logout");
        }
    }
}

impl Mailbox for ImapMailbox {
    async fn search(&mut self, query: &SearchQuery) -> Result<Vec<Uid>, MailboxError> {
        let criteria = format!(
            "FROM {} SINCE {}",
            quote(&query.sender),
            query.since.format("%d-%b-%Y")
        );

        self.session
            .uid_search(&criteria)
            .await
            .map_err(|e| MailboxError::Search(e.to_string()))
    }

    async fn fetch(&mut self, uid: Uid) -> Result<Option<Vec<u8>>, MailboxError> {
        self.session
            .uid_fetch_raw(uid)
            .await
            .map_err(|e| MailboxError::Fetch(e.to_string()))
    }
}
