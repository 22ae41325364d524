//! IMAP session handling.
//!
//! A [`Session`] drives the short, fixed command conversation the ingestion
//! pipeline needs: LOGIN, SELECT, UID SEARCH, UID FETCH, LOGOUT.

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufStream};
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::types::Uid;

/// Generates unique command tags (A0001, A0002, ...).
#[derive(Debug, Default)]
struct TagGenerator {
    counter: u32,
}

impl TagGenerator {
    fn next_tag(&mut self) -> String {
        self.counter += 1;
        format!("A{:04}", self.counter)
    }
}

/// An untagged server response line, with its literal payload if one followed.
#[derive(Debug)]
pub struct Untagged {
    /// The response line (without CRLF, without the literal bytes).
    pub line: String,
    /// Literal payload announced by a trailing `{n}` octet count.
    pub literal: Option<Vec<u8>>,
}

/// An IMAP session over an arbitrary async stream.
///
/// Generic over the stream so protocol handling can be tested against
/// in-memory duplex pipes.
pub struct Session<S> {
    stream: BufStream<S>,
    tag: TagGenerator,
}

impl<S: AsyncRead + AsyncWrite + Unpin> Session<S> {
    /// Wraps a connected stream and consumes the server greeting.
    ///
    /// # Errors
    ///
    /// Returns an error if the greeting is missing, malformed, or a BYE.
    pub async fn new(stream: S) -> Result<Self> {
        let mut session = Self {
            stream: BufStream::new(stream),
            tag: TagGenerator::default(),
        };

        let greeting = session.read_line().await?;
        trace!(%greeting, "IMAP greeting");

        if greeting.starts_with("* OK") || greeting.starts_with("* PREAUTH") {
            Ok(session)
        } else if let Some(rest) = greeting.strip_prefix("* BYE") {
            Err(Error::Bye(rest.trim().to_string()))
        } else {
            Err(Error::Protocol(format!("Unexpected greeting: {greeting}")))
        }
    }

    /// Authenticates with LOGIN.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] if the server rejects the credentials.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<()> {
        let command = format!("LOGIN {} {}", quote(username), quote(password));
        self.command(&command).await.map_err(|e| match e {
            Error::No(msg) => Error::Auth(msg),
            other => other,
        })?;
        debug!(username, "IMAP login succeeded");
        Ok(())
    }

    /// Selects a mailbox and returns its EXISTS count.
    ///
    /// # Errors
    ///
    /// Returns an error if the mailbox cannot be selected.
    pub async fn select(&mut self, mailbox: &str) -> Result<u32> {
        let untagged = self.command(&format!("SELECT {}", quote(mailbox))).await?;

        let exists = untagged
            .iter()
            .filter_map(|u| {
                let mut tokens = u.line.trim_start_matches("* ").split_whitespace();
                let count = tokens.next()?.parse::<u32>().ok()?;
                (tokens.next()? == "EXISTS").then_some(count)
            })
            .next_back()
            .unwrap_or(0);

        debug!(mailbox, exists, "Selected mailbox");
        Ok(exists)
    }

    /// Runs `UID SEARCH` with the given criteria and returns matching UIDs.
    ///
    /// # Errors
    ///
    /// Returns an error if the search is rejected or the response is
    /// malformed.
    pub async fn uid_search(&mut self, criteria: &str) -> Result<Vec<Uid>> {
        let untagged = self.command(&format!("UID SEARCH {criteria}")).await?;

        let mut uids = Vec::new();
        for u in &untagged {
            if let Some(rest) = u.line.strip_prefix("* SEARCH") {
                for token in rest.split_whitespace() {
                    let value = token
                        .parse::<u32>()
                        .map_err(|_| Error::Parse(format!("Invalid UID in SEARCH: {token}")))?;
                    uids.push(Uid(value));
                }
            }
        }

        debug!(criteria, count = uids.len(), "UID SEARCH completed");
        Ok(uids)
    }

    /// Fetches the full RFC 822 body of a message by UID.
    ///
    /// Returns `None` if the server reports no such message (e.g., expunged
    /// between search and fetch).
    ///
    /// # Errors
    ///
    /// Returns an error if the fetch is rejected.
    pub async fn uid_fetch_raw(&mut self, uid: Uid) -> Result<Option<Vec<u8>>> {
        let untagged = self.command(&format!("UID FETCH {uid} (RFC822)")).await?;

        let body = untagged.into_iter().find_map(|u| u.literal);
        debug!(%uid, found = body.is_some(), "UID FETCH completed");
        Ok(body)
    }

    /// Logs out and lets the server close the connection.
    ///
    /// # Errors
    ///
    /// Returns an error on protocol or I/O failure.
    pub async fn logout(&mut self) -> Result<()> {
        match self.command("LOGOUT").await {
            Ok(_) | Err(Error::Bye(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Sends a tagged command and collects responses until its completion.
    async fn command(&mut self, command: &str) -> Result<Vec<Untagged>> {
        let tag = self.tag.next_tag();
        trace!(%tag, command, "Sending command");

        self.stream
            .write_all(format!("{tag} {command}\r\n").as_bytes())
            .await?;
        self.stream.flush().await?;

        let mut untagged = Vec::new();
        let mut bye: Option<String> = None;

        loop {
            let line = match self.read_line().await {
                Ok(line) => line,
                Err(e) => {
                    // Connection may legitimately close right after BYE.
                    if let Some(msg) = bye {
                        return Err(Error::Bye(msg));
                    }
                    return Err(e);
                }
            };

            if let Some(rest) = line.strip_prefix(&format!("{tag} ")) {
                return Self::parse_tagged(rest, untagged);
            }

            if let Some(rest) = line.strip_prefix("* BYE") {
                bye = Some(rest.trim().to_string());
            }

            if let Some(count) = literal_length(&line) {
                let mut buf = vec![0u8; count];
                self.stream.read_exact(&mut buf).await?;
                // Consume the remainder of the enclosing response line.
                let _trailer = self.read_line().await?;
                untagged.push(Untagged {
                    line,
                    literal: Some(buf),
                });
            } else {
                untagged.push(Untagged {
                    line,
                    literal: None,
                });
            }
        }
    }

    /// Maps a tagged completion (`OK ...` / `NO ...` / `BAD ...`).
    fn parse_tagged(rest: &str, untagged: Vec<Untagged>) -> Result<Vec<Untagged>> {
        let (status, detail) = rest.split_once(' ').unwrap_or((rest, ""));
        match status {
            "OK" => Ok(untagged),
            "NO" => Err(Error::No(detail.to_string())),
            "BAD" => Err(Error::Bad(detail.to_string())),
            other => Err(Error::Protocol(format!(
                "Unexpected tagged status: {other}"
            ))),
        }
    }

    /// Reads one CRLF-terminated line, without the terminator.
    async fn read_line(&mut self) -> Result<String> {
        let mut buf = Vec::new();
        let read = self.stream.read_until(b'\n', &mut buf).await?;
        if read == 0 {
            return Err(Error::Protocol("Connection closed by server".to_string()));
        }

        while buf.last().is_some_and(|b| *b == b'\n' || *b == b'\r') {
            buf.pop();
        }

        String::from_utf8(buf).map_err(|e| Error::Parse(format!("Non-UTF-8 response line: {e}")))
    }
}

/// Quotes a string for use in an IMAP command.
#[must_use]
pub fn quote(s: &str) -> String {
    let escaped = s.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

/// Extracts the octet count from a trailing `{n}` literal announcement.
fn literal_length(line: &str) -> Option<usize> {
    let open = line.rfind('{')?;
    let inner = line.get(open + 1..line.len() - 1)?;
    if line.ends_with('}') {
        inner.parse().ok()
    } else {
        None
    }
}
