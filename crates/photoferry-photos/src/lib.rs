//! # photoferry-photos
//!
//! Remote photo library client with `OAuth2` token refresh.
//!
//! Provides the three operations an ingestion pipeline needs against a
//! Google-Photos-style API:
//!
//! - `ensure_album`: find an album by title or create it
//! - `upload_bytes`: raw byte upload plus media item creation
//! - `add_to_album`: batch album association
//!
//! Errors carry a retryable/permanent classification so callers can drive
//! backoff policies without inspecting HTTP details.
//!
//! ## Quick Start
//!
//! ```no_run
//! use photoferry_photos::{Credentials, PhotosClient};
//!
//! # async fn example() -> photoferry_photos::Result<()> {
//! let credentials = Credentials {
//!     client_id: "id".into(),
//!     client_secret: "secret".into(),
//!     refresh_token: "refresh".into(),
//!     token_url: photoferry_photos::GOOGLE_TOKEN_URL.into(),
//! };
//!
//! let token = credentials.refresh(&reqwest::Client::new()).await?;
//! let client = PhotosClient::new(token)?;
//!
//! let album = client.ensure_album("School Photos").await?;
//! let media = client.upload_bytes(b"...jpeg bytes...", "friday.jpg").await?;
//! client.add_to_album(&album, &media).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod client;
mod error;
mod token;

pub use client::{AlbumHandle, DEFAULT_API_BASE, MediaHandle, PhotosClient};
pub use error::{Error, Result};
pub use token::{Credentials, GOOGLE_TOKEN_URL, Token, TokenResponse};
