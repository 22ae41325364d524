//! Photo library collaborator: trait and remote client implementation.

pub use photoferry_photos::{AlbumHandle, MediaHandle};
use photoferry_photos::PhotosClient;

/// Errors from the photo library collaborator, pre-classified for the retry
/// policy.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PhotoError {
    /// Transient failure; retrying the same request may succeed.
    #[error("Transient photo library error: {0}")]
    Transient(String),

    /// Permanent failure; retrying cannot help.
    #[error("Permanent photo library error: {0}")]
    Permanent(String),
}

impl PhotoError {
    /// Whether retrying the same request may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

impl From<photoferry_photos::Error> for PhotoError {
    fn from(e: photoferry_photos::Error) -> Self {
        if e.is_retryable() {
            Self::Transient(e.to_string())
        } else {
            Self::Permanent(e.to_string())
        }
    }
}

/// A remote photo library that receives uploads into a named album.
///
/// The pipeline is tested against fakes implementing this trait; the real
/// implementation is [`PhotosClient`].
#[allow(async_fn_in_trait)]
pub trait PhotoLibrary {
    /// Finds an album by title, creating it if absent.
    async fn ensure_album(&self, title: &str) -> Result<AlbumHandle, PhotoError>;

    /// Uploads raw bytes and returns the remote content handle.
    async fn upload_bytes(&self, content: &[u8], filename: &str)
    -> Result<MediaHandle, PhotoError>;

    /// Adds previously uploaded content to an album.
    async fn add_to_album(
        &self,
        album: &AlbumHandle,
        media: &MediaHandle,
    ) -> Result<(), PhotoError>;
}

impl PhotoLibrary for PhotosClient {
    async fn ensure_album(&self, title: &str) -> Result<AlbumHandle, PhotoError> {
        Self::ensure_album(self, title).await.map_err(Into::into)
    }

    async fn upload_bytes(
        &self,
        content: &[u8],
        filename: &str,
    ) -> Result<MediaHandle, PhotoError> {
        Self::upload_bytes(self, content, filename)
            .await
            .map_err(Into::into)
    }

    async fn add_to_album(
        &self,
        album: &AlbumHandle,
        media: &MediaHandle,
    ) -> Result<(), PhotoError> {
        Self::add_to_album(self, album, media)
            .await
            .map_err(Into::into)
    }
}
