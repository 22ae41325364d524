//! # photoferry-imap
//!
//! Minimal async IMAP client for batch mailbox ingestion.
//!
//! This crate implements exactly the conversation a periodic ingestion job
//! needs: connect over TLS, LOGIN, SELECT a mailbox, `UID SEARCH` by sender
//! and date, `UID FETCH` full message bodies, LOGOUT. It is not a general
//! IMAP library; there is no IDLE, no pipelining, no extension negotiation.
//!
//! ## Quick Start
//!
//! ```no_run
//! use photoferry_imap::{Session, connect_tls, quote};
//!
//! # async fn example() -> photoferry_imap::Result<()> {
//! let stream = connect_tls("imap.example.com", 993).await?;
//! let mut session = Session::new(stream).await?;
//!
//! session.login("user@example.com", "app-password").await?;
//! session.select("INBOX").await?;
//!
//! let criteria = format!("FROM {} SINCE 01-Aug-2026", quote("school@example.com"));
//! for uid in session.uid_search(&criteria).await? {
//!     if let Some(raw) = session.uid_fetch_raw(uid).await? {
//!         // parse raw RFC 822 bytes
//!     }
//! }
//!
//! session.logout().await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod error;
mod session;
mod stream;
mod types;

pub use error::{Error, Result};
pub use session::{Session, Untagged, quote};
pub use stream::{ImapStream, connect_plain, connect_tls, create_tls_connector};
pub use types::Uid;
