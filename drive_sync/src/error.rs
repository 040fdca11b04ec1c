//! Error types for the drive_sync crate.

use thiserror::Error;

/// Errors that can occur while syncing with Google Drive or converting documents.
#[derive(Error, Debug)]
pub enum DriveError {
    #[error("{0} not found. Please ensure it is in your current working directory.")]
    CredentialsNotFound(String),

    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Invalid URL or ID: {0}")]
    InvalidUrlOrId(String),

    #[error("Glob pattern error: {0}")]
    GlobPatternError(#[from] glob::PatternError),

    #[error("JWT encoding error: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),

    #[error("Failed to refresh token: {0}")]
    TokenRefreshError(String),

    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("DOCX archive error: {0}")]
    DocxArchive(#[from] zip::result::ZipError),

    #[error("DOCX XML error: {0}")]
    DocxXml(#[from] quick_xml::Error),
}

/// Result type alias for DriveError.
pub type Result<T> = std::result::Result<T, DriveError>;
