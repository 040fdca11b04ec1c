//! drive_sync - keep a Google Drive folder and a local directory in step.
//!
//! This library provides functionality to:
//! - Download files of one MIME type from a Drive folder, skipping names already on disk
//! - Upload local files to a Drive folder, skipping names already in the folder
//! - Convert PDF and DOCX documents to sibling `.txt` files
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! use drive_sync::{sync, Authenticator, DriveClient};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let auth =
//!         Authenticator::from_paths(Path::new("credentials.json"), Path::new("token.json")).await?;
//!     let client = DriveClient::new(auth);
//!
//!     let report =
//!         sync::download_folder(&client, "folder-id", Path::new("PDF_docs"), "application/pdf")
//!             .await?;
//!     println!("{} downloaded", report.transferred.len());
//!
//!     drive_sync::convert::convert_pdfs("PDF_docs")?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod consent;
pub mod convert;
pub mod error;
pub mod models;
pub mod sync;
pub mod url_parser;

// Re-exports for convenience
pub use auth::Authenticator;
pub use client::DriveClient;
pub use error::{DriveError, Result};
pub use models::FileMetadata;
pub use sync::SyncReport;
pub use url_parser::extract_id;
