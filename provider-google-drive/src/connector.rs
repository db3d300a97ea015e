//! Google Drive API connector implementation
//!
//! Implements the `StorageProvider` trait for Google Drive API v3.

use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use bridge_traits::storage::{RemoteAccount, RemoteFile, StorageProvider};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use core_auth::TokenProvider;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::{GoogleDriveError, Result};
use crate::types::{AboutResponse, DriveFile, FilesListResponse};

/// Google Drive API base URL
const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

/// Maximum results per page (Google Drive API limit)
pub const MAX_PAGE_SIZE: u32 = 1000;

/// Default results per page
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Only image files that are not in the trash
const IMAGE_QUERY: &str = "mimeType contains 'image/' and trashed = false";

/// Newest first
const ORDER_BY: &str = "modifiedTime desc";

/// Fields to request for file resources
const FILE_FIELDS: &str = "id,name,mimeType,size,createdTime,modifiedTime,thumbnailLink,trashed";

const API_TIMEOUT: Duration = Duration::from_secs(30);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// Google Drive API connector
///
/// # Features
///
/// - Paginated listing of image files, newest first
/// - Downloads with optional range requests
/// - Account lookup for the connection label
/// - One request per call; failures are not retried
///
/// A bearer token is requested from the [`TokenProvider`] for every call so
/// refreshed credentials are picked up without rebuilding the connector.
///
/// # Example
///
/// ```ignore
/// use provider_google_drive::GoogleDriveConnector;
/// use bridge_traits::storage::StorageProvider;
///
/// let connector = GoogleDriveConnector::new(http_client, token_provider);
/// let (files, next_cursor) = connector.list_media(None).await?;
/// ```
pub struct GoogleDriveConnector {
    http_client: Arc<dyn HttpClient>,
    tokens: Arc<dyn TokenProvider>,
    page_size: u32,
}

impl GoogleDriveConnector {
    pub fn new(http_client: Arc<dyn HttpClient>, tokens: Arc<dyn TokenProvider>) -> Self {
        Self {
            http_client,
            tokens,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Results per page, clamped to `1..=1000`.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// One page of image files, newest first.
    #[instrument(skip(self))]
    pub async fn list_files(
        &self,
        page_token: Option<&str>,
    ) -> Result<(Vec<RemoteFile>, Option<String>)> {
        let mut url = format!(
            "{}/files?q={}&orderBy={}&pageSize={}&fields=nextPageToken,files({})",
            DRIVE_API_BASE,
            urlencoding::encode(IMAGE_QUERY),
            urlencoding::encode(ORDER_BY),
            self.page_size,
            FILE_FIELDS
        );

        if let Some(token) = page_token {
            url.push_str(&format!("&pageToken={}", urlencoding::encode(token)));
        }

        let response = self.execute_get(url, API_TIMEOUT, None).await?;

        let list_response: FilesListResponse = serde_json::from_slice(&response.body)
            .map_err(|e| GoogleDriveError::ParseError(format!("files list: {}", e)))?;

        let files: Vec<RemoteFile> = list_response
            .files
            .into_iter()
            .filter(|f| !f.trashed)
            .map(convert_file)
            .collect();

        info!("Listed {} image files from Google Drive", files.len());

        Ok((files, list_response.next_page_token))
    }

    /// Metadata for a single file.
    #[instrument(skip(self))]
    pub async fn get_file(&self, file_id: &str) -> Result<RemoteFile> {
        let url = format!(
            "{}/files/{}?fields={}",
            DRIVE_API_BASE,
            urlencoding::encode(file_id),
            FILE_FIELDS
        );

        let response = self
            .execute_get(url, API_TIMEOUT, None)
            .await
            .map_err(|e| not_found(e, file_id))?;

        let drive_file: DriveFile = serde_json::from_slice(&response.body)
            .map_err(|e| GoogleDriveError::ParseError(format!("file metadata: {}", e)))?;

        Ok(convert_file(drive_file))
    }

    /// Raw file content, optionally restricted to a `Range` header value.
    #[instrument(skip(self))]
    pub async fn download_file(&self, file_id: &str, range: Option<&str>) -> Result<Bytes> {
        let url = format!(
            "{}/files/{}?alt=media",
            DRIVE_API_BASE,
            urlencoding::encode(file_id)
        );

        let response = self
            .execute_get(url, DOWNLOAD_TIMEOUT, range)
            .await
            .map_err(|e| not_found(e, file_id))?;

        debug!("Downloaded {} bytes", response.body.len());
        Ok(response.body)
    }

    /// The account the token belongs to.
    #[instrument(skip(self))]
    pub async fn get_user_info(&self) -> Result<RemoteAccount> {
        let url = format!(
            "{}/about?fields={}",
            DRIVE_API_BASE,
            urlencoding::encode("user(displayName,emailAddress,photoLink)")
        );

        let response = self.execute_get(url, API_TIMEOUT, None).await?;

        let about: AboutResponse = serde_json::from_slice(&response.body)
            .map_err(|e| GoogleDriveError::ParseError(format!("about: {}", e)))?;

        Ok(RemoteAccount {
            display_name: about.user.display_name,
            email: about.user.email_address,
            photo_url: about.user.photo_link,
        })
    }

    /// Execute one authenticated GET request.
    ///
    /// Failures are returned as-is; the import flow surfaces them as
    /// connection errors and the user decides whether to retry.
    #[instrument(skip(self, timeout), fields(url = %url))]
    async fn execute_get(
        &self,
        url: String,
        timeout: Duration,
        range: Option<&str>,
    ) -> Result<HttpResponse> {
        let token = self.tokens.access_token().await?;
        let request = HttpRequest::new(HttpMethod::Get, url)
            .bearer_token(token)
            .timeout(timeout);
        let request = match range {
            Some(value) => request.header("Range", value),
            None => request.header("Accept", "application/json"),
        };

        let response = self.http_client.execute(request).await.map_err(|e| {
            warn!("API request failed: {}", e);
            GoogleDriveError::from(e)
        })?;

        match response.status {
            200 | 206 => {
                debug!("API request succeeded: status={}", response.status);
                Ok(response)
            }
            401 | 403 => {
                warn!("API request rejected: status={}", response.status);
                Err(GoogleDriveError::AuthenticationFailed(format!(
                    "Drive rejected the access token (status {})",
                    response.status
                )))
            }
            429 => {
                warn!("API request rate limited");
                Err(GoogleDriveError::RateLimited)
            }
            _ => {
                warn!("API request failed: status={}", response.status);
                Err(api_error(&response))
            }
        }
    }
}

fn api_error(response: &HttpResponse) -> GoogleDriveError {
    GoogleDriveError::ApiError {
        status_code: response.status,
        message: String::from_utf8_lossy(&response.body).to_string(),
    }
}

fn not_found(error: GoogleDriveError, file_id: &str) -> GoogleDriveError {
    match error {
        GoogleDriveError::ApiError {
            status_code: 404, ..
        } => GoogleDriveError::FileNotFound {
            file_id: file_id.to_string(),
        },
        other => other,
    }
}

/// Parse RFC 3339 timestamp to Unix timestamp
fn parse_timestamp(rfc3339: Option<&str>) -> Option<i64> {
    rfc3339
        .and_then(|value| DateTime::parse_from_rfc3339(value).ok())
        .map(|dt| dt.with_timezone(&Utc).timestamp())
}

fn convert_file(drive_file: DriveFile) -> RemoteFile {
    let mut metadata = HashMap::new();
    metadata.insert("trashed".to_string(), drive_file.trashed.to_string());

    RemoteFile {
        is_folder: drive_file.is_folder(),
        size: drive_file.size_bytes(),
        created_at: parse_timestamp(drive_file.created_time.as_deref()),
        modified_at: parse_timestamp(drive_file.modified_time.as_deref()),
        id: drive_file.id,
        name: drive_file.name,
        mime_type: Some(drive_file.mime_type),
        thumbnail_url: drive_file.thumbnail_link,
        metadata,
    }
}

#[async_trait]
impl StorageProvider for GoogleDriveConnector {
    async fn list_media(
        &self,
        cursor: Option<String>,
    ) -> bridge_traits::error::Result<(Vec<RemoteFile>, Option<String>)> {
        Ok(self.list_files(cursor.as_deref()).await?)
    }

    async fn get_metadata(&self, file_id: &str) -> bridge_traits::error::Result<RemoteFile> {
        Ok(self.get_file(file_id).await?)
    }

    async fn download(
        &self,
        file_id: &str,
        range: Option<&str>,
    ) -> bridge_traits::error::Result<Bytes> {
        Ok(self.download_file(file_id, range).await?)
    }

    async fn account(&self) -> bridge_traits::error::Result<RemoteAccount> {
        Ok(self.get_user_info().await?)
    }
}
