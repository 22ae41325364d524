//! # photoferry-mime
//!
//! MIME message parsing for extracting email attachments.
//!
//! ## Features
//!
//! - **Message parsing**: RFC 822 messages with nested multipart support
//! - **Attachment detection**: Content-Disposition and filename resolution
//! - **Decoding**: Base64, Quoted-Printable, RFC 2047 encoded headers
//! - **Content types**: MIME content type and disposition parsing
//!
//! ## Quick Start
//!
//! ```
//! use photoferry_mime::Message;
//!
//! let raw = b"From: school@example.com\r\n\
//!             Subject: [School ]\r\n\
//!             Content-Type: text/plain\r\n\
//!             \r\n\
//!             No photos this week.";
//!
//! let message = Message::parse(raw)?;
//! assert_eq!(message.subject().as_deref(), Some("[School ]"));
//! # Ok::<(), photoferry_mime::Error>(())
//! ```
//!
//! Attachments are leaf parts flagged by `Content-Disposition`:
//!
//! ```no_run
//! # use photoferry_mime::Message;
//! # let message = Message::parse(b"").unwrap();
//! for part in &message.parts {
//!     if part.is_attachment() {
//!         let filename = part.filename();
//!         let bytes = part.decode_body()?;
//!     }
//! }
//! # Ok::<(), photoferry_mime::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod content_type;
mod disposition;
mod error;
mod header;
mod message;

pub mod encoding;

pub use content_type::ContentType;
pub use disposition::{ContentDisposition, DispositionType};
pub use error::{Error, Result};
pub use header::Headers;
pub use message::{Message, Part, TransferEncoding};
