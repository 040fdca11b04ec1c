//! Google Drive API client for folder sync operations.

use std::path::Path;

use futures::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use tracing::{debug, info};

use crate::auth::Authenticator;
use crate::error::{DriveError, Result};
use crate::models::{ApiErrorResponse, FileListResponse, FileMetadata};

/// Base URL for Google Drive API v3.
const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

/// Upload URL for Google Drive API.
const UPLOAD_API_BASE: &str = "https://www.googleapis.com/upload/drive/v3";

const LIST_FIELDS: &str = "nextPageToken, files(id, name, mimeType, size)";

/// Authenticated session against the Drive API.
pub struct DriveClient {
    auth: Authenticator,
    http: Client,
    api_base: String,
    upload_base: String,
}

impl DriveClient {
    /// Create a client talking to the public Google endpoints.
    pub fn new(auth: Authenticator) -> Self {
        Self::with_endpoints(auth, DRIVE_API_BASE, UPLOAD_API_BASE)
    }

    /// Create a client against custom API and upload base URLs.
    pub fn with_endpoints(
        auth: Authenticator,
        api_base: impl Into<String>,
        upload_base: impl Into<String>,
    ) -> Self {
        Self {
            auth,
            http: Client::new(),
            api_base: api_base.into(),
            upload_base: upload_base.into(),
        }
    }

    /// Fetch a single page of a files.list query.
    pub async fn list_page(
        &self,
        query: &str,
        page_size: Option<u32>,
        page_token: Option<&str>,
    ) -> Result<FileListResponse> {
        let token = self.auth.access_token().await?;

        let mut request = self
            .http
            .get(format!("{}/files", self.api_base))
            .bearer_auth(&token)
            .query(&[
                ("q", query),
                ("spaces", "drive"),
                ("includeItemsFromAllDrives", "true"),
                ("supportsAllDrives", "true"),
                ("fields", LIST_FIELDS),
            ]);

        if let Some(size) = page_size {
            request = request.query(&[("pageSize", size.to_string())]);
        }
        if let Some(token) = page_token {
            request = request.query(&[("pageToken", token)]);
        }

        debug!(query, page_token, "listing files");
        let response = check_status(request.send().await?).await?;
        Ok(response.json().await?)
    }

    /// Run a files.list query to exhaustion, following page tokens.
    pub async fn list_all(
        &self,
        query: &str,
        page_size: Option<u32>,
    ) -> Result<Vec<FileMetadata>> {
        let mut all_files = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = self
                .list_page(query, page_size, page_token.as_deref())
                .await?;
            all_files.extend(page.files);

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(all_files)
    }

    /// Download a file's content into memory, then write it to `destination`.
    ///
    /// Returns the number of bytes written.
    pub async fn download_to<P: AsRef<Path>>(&self, file_id: &str, destination: P) -> Result<u64> {
        let token = self.auth.access_token().await?;

        let response = self
            .http
            .get(format!("{}/files/{}", self.api_base, file_id))
            .bearer_auth(&token)
            .query(&[("alt", "media"), ("supportsAllDrives", "true")])
            .send()
            .await?;
        let response = check_status(response).await?;

        let total = response.content_length();
        let mut buffer = Vec::with_capacity(total.unwrap_or(0) as usize);
        let mut stream = response.bytes_stream();
        let mut reported = None;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            buffer.extend_from_slice(&chunk);
            if let Some(total) = total.filter(|t| *t > 0) {
                let percent = progress_percent(buffer.len() as u64, total);
                if reported != Some(percent) {
                    info!("Download {}%.", percent);
                    reported = Some(percent);
                }
            }
        }

        tokio::fs::write(destination.as_ref(), &buffer).await?;
        Ok(buffer.len() as u64)
    }

    /// Create a new file in `parent_id` with the content of `local_path`.
    ///
    /// Never replaces an existing remote file; Drive allows duplicate names.
    pub async fn upload_file<P: AsRef<Path>>(
        &self,
        local_path: P,
        parent_id: &str,
    ) -> Result<FileMetadata> {
        let local_path = local_path.as_ref();
        let filename = local_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                DriveError::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("not a file name: {}", local_path.display()),
                ))
            })?;
        let mime_type = mime_guess::from_path(local_path)
            .first_or_octet_stream()
            .to_string();

        let token = self.auth.access_token().await?;
        let file_content = tokio::fs::read(local_path).await?;

        let metadata = serde_json::json!({
            "name": filename,
            "parents": [parent_id]
        });

        let metadata_part = Part::text(metadata.to_string()).mime_str("application/json")?;

        let file_part = Part::bytes(file_content)
            .file_name(filename.to_string())
            .mime_str(&mime_type)?;

        let form = Form::new()
            .part("metadata", metadata_part)
            .part("file", file_part);

        let response = self
            .http
            .post(format!("{}/files", self.upload_base))
            .bearer_auth(&token)
            .query(&[
                ("uploadType", "multipart"),
                ("supportsAllDrives", "true"),
                ("fields", "id, name, mimeType, size"),
            ])
            .multipart(form)
            .send()
            .await?;

        let response = check_status(response).await?;
        Ok(response.json().await?)
    }
}

/// Whole percent of `total` received so far, capped at 100.
fn progress_percent(received: u64, total: u64) -> u64 {
    (received.saturating_mul(100) / total).min(100)
}

/// Turn a non-2xx response into [`DriveError::ApiError`].
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_body = response.text().await.unwrap_or_default();
    if let Ok(api_error) = serde_json::from_str::<ApiErrorResponse>(&error_body) {
        return Err(DriveError::ApiError {
            status: api_error.error.code,
            message: api_error.error.message,
        });
    }
    Err(DriveError::ApiError {
        status: status.as_u16(),
        message: error_body,
    })
}
