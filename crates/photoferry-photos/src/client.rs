//! Photo library API client.
//!
//! Speaks the Google-Photos-style REST surface: raw byte upload returning an
//! upload token, media item creation, album listing/creation, and batch
//! album association. Endpoints are injectable so tests can point the client
//! at a local server.

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::fmt;
use tracing::{debug, info};
use url::Url;

use crate::error::{Error, Result};
use crate::token::Token;

/// Default API base for the Google Photos Library API.
pub const DEFAULT_API_BASE: &str = "https://photoslibrary.googleapis.com/v1/";

/// Opaque identifier of an album in the remote library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumHandle(pub String);

impl fmt::Display for AlbumHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque identifier of an uploaded media item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaHandle(pub String);

impl fmt::Display for MediaHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Deserialize)]
struct Album {
    id: String,
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AlbumList {
    #[serde(default)]
    albums: Vec<Album>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchCreateResponse {
    #[serde(default)]
    new_media_item_results: Vec<NewMediaItemResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewMediaItemResult {
    media_item: Option<MediaItem>,
    status: Option<ItemStatus>,
}

#[derive(Debug, Deserialize)]
struct MediaItem {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ItemStatus {
    #[serde(default)]
    message: String,
}

/// Client for the remote photo library.
pub struct PhotosClient {
    http: Client,
    api_base: Url,
    token: Token,
}

impl PhotosClient {
    /// Creates a client against the default API base.
    ///
    /// # Errors
    ///
    /// Returns an error if the default base URL fails to parse (it does not).
    pub fn new(token: Token) -> Result<Self> {
        Ok(Self {
            http: Client::new(),
            api_base: Url::parse(DEFAULT_API_BASE)?,
            token,
        })
    }

    /// Points the client at a different API base (testing, proxies).
    ///
    /// # Errors
    ///
    /// Returns an error if `base` is not a valid URL. A trailing slash is
    /// required for endpoint joining and appended when missing.
    pub fn with_base_url(mut self, base: &str) -> Result<Self> {
        let base = if base.ends_with('/') {
            base.to_string()
        } else {
            format!("{base}/")
        };
        self.api_base = Url::parse(&base)?;
        Ok(self)
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.api_base.join(path).map_err(Into::into)
    }

    /// Finds an album by title, creating it if absent. Returns its handle.
    ///
    /// # Errors
    ///
    /// Returns an error if listing or creation fails.
    pub async fn ensure_album(&self, title: &str) -> Result<AlbumHandle> {
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .http
                .get(self.endpoint("albums")?)
                .bearer_auth(&self.token.access_token)
                .query(&[("pageSize", "50")]);
            if let Some(ref token) = page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let response = check_status(request.send().await?).await?;
            let list: AlbumList = response.json().await?;

            if let Some(album) = list.albums.into_iter().find(|a| a.title == title) {
                debug!(title, id = %album.id, "Found existing album");
                return Ok(AlbumHandle(album.id));
            }

            page_token = list.next_page_token;
            if page_token.is_none() {
                break;
            }
        }

        let body = json!({ "album": { "title": title } });
        let response = check_status(
            self.http
                .post(self.endpoint("albums")?)
                .bearer_auth(&self.token.access_token)
                .json(&body)
                .send()
                .await?,
        )
        .await?;

        let album: Album = response.json().await?;
        info!(title, id = %album.id, "Created album");
        Ok(AlbumHandle(album.id))
    }

    /// Uploads raw bytes and creates a media item; returns its handle.
    ///
    /// Two remote steps: a raw byte upload yielding a short-lived upload
    /// token, then media item creation from that token. The media item is
    /// created unfiled; album association is a separate call.
    ///
    /// # Errors
    ///
    /// Returns an error if either step fails; [`Error::is_retryable`]
    /// distinguishes transient from permanent causes.
    pub async fn upload_bytes(&self, content: &[u8], filename: &str) -> Result<MediaHandle> {
        let response = check_status(
            self.http
                .post(self.endpoint("uploads")?)
                .bearer_auth(&self.token.access_token)
                .header(CONTENT_TYPE, "application/octet-stream")
                .header("X-Goog-Upload-Protocol", "raw")
                .header("X-Goog-Upload-File-Name", filename)
                .body(content.to_vec())
                .send()
                .await?,
        )
        .await?;

        let upload_token = response.text().await?;
        if upload_token.is_empty() {
            return Err(Error::InvalidResponse(format!(
                "Empty upload token for {filename}"
            )));
        }
        debug!(filename, "Obtained upload token");

        let body = json!({
            "newMediaItems": [{
                "simpleMediaItem": {
                    "uploadToken": upload_token,
                    "fileName": filename,
                }
            }]
        });

        let response = check_status(
            self.http
                .post(self.endpoint("mediaItems:batchCreate")?)
                .bearer_auth(&self.token.access_token)
                .json(&body)
                .send()
                .await?,
        )
        .await?;

        let created: BatchCreateResponse = response.json().await?;
        let result = created.new_media_item_results.into_iter().next().ok_or_else(|| {
            Error::InvalidResponse("batchCreate returned no results".to_string())
        })?;

        match result.media_item {
            Some(item) => {
                info!(filename, id = %item.id, "Media item created");
                Ok(MediaHandle(item.id))
            }
            None => {
                let message = result
                    .status
                    .map_or_else(|| "unknown error".to_string(), |s| s.message);
                Err(Error::Rejected(format!("{filename}: {message}")))
            }
        }
    }

    /// Adds an uploaded media item to an album.
    ///
    /// # Errors
    ///
    /// Returns an error if the association is rejected.
    pub async fn add_to_album(&self, album: &AlbumHandle, media: &MediaHandle) -> Result<()> {
        let path = format!("albums/{}:batchAddMediaItems", album.0);
        let body = json!({ "mediaItemIds": [media.0] });

        check_status(
            self.http
                .post(self.endpoint(&path)?)
                .bearer_auth(&self.token.access_token)
                .json(&body)
                .send()
                .await?,
        )
        .await?;

        debug!(album = %album, media = %media, "Added media item to album");
        Ok(())
    }
}

/// Maps non-success HTTP statuses into the error taxonomy.
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let detail = response.text().await.unwrap_or_default();
    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::Auth(detail),
        StatusCode::BAD_REQUEST => Error::Rejected(detail),
        _ => Error::Status { status, detail },
    })
}
