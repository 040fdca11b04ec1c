//! drive_sync CLI - sync a Google Drive folder and convert documents to text.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing_subscriber::{fmt, EnvFilter};

use drive_sync::sync::{self, DEFAULT_MIME_TYPE, DEFAULT_UPLOAD_PATTERN};
use drive_sync::{convert, extract_id, Authenticator, DriveClient};

/// Download, upload and convert files for a Google Drive folder.
#[derive(Parser)]
#[command(name = "drive_sync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Action to perform.
    #[arg(value_enum)]
    action: Action,

    /// Drive folder URL or ID (required for download and upload).
    folder: Option<String>,

    /// Path to the persisted OAuth token.
    #[arg(long, env = "DRIVE_SYNC_TOKEN", default_value = "token.json")]
    token: PathBuf,

    /// Path to the OAuth client secrets or service account key.
    #[arg(long, env = "DRIVE_SYNC_CREDENTIALS", default_value = "credentials.json")]
    credentials: PathBuf,

    /// File or directory to upload from or convert.
    #[arg(long, env = "DRIVE_SYNC_DIRECTORY", default_value = ".")]
    directory: PathBuf,

    /// Directory downloads are saved to.
    #[arg(long, default_value = "PDF_docs")]
    save_dir: PathBuf,

    /// MIME type of the remote files to download.
    #[arg(long, default_value = DEFAULT_MIME_TYPE)]
    mime_type: String,

    /// Glob for local file names to upload.
    #[arg(long, default_value = DEFAULT_UPLOAD_PATTERN)]
    pattern: String,

    /// Use this bearer token instead of the OAuth files.
    #[arg(long, env = "DRIVE_SYNC_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Action {
    /// Download missing files from the folder.
    #[value(alias = "download_pdfs")]
    Download,
    /// Upload local files the folder does not have yet.
    #[value(alias = "upload_txt")]
    Upload,
    /// Convert PDF documents to text.
    #[value(alias = "convert_pdfs")]
    ConvertPdf,
    /// Convert DOCX documents to text.
    #[value(alias = "convert_docx")]
    ConvertDocx,
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("drive_sync=info"));
    fmt().with_env_filter(filter).with_target(false).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    match cli.action {
        Action::ConvertPdf => {
            let outputs = convert::convert_pdfs(&cli.directory)
                .with_context(|| format!("Failed to convert PDFs in {:?}", cli.directory))?;
            println!("Converted {} PDF file(s).", outputs.len());
        }

        Action::ConvertDocx => {
            let outputs = convert::convert_docx(&cli.directory)
                .with_context(|| format!("Failed to convert DOCX files in {:?}", cli.directory))?;
            println!("Converted {} DOCX file(s).", outputs.len());
        }

        Action::Download => {
            let folder_id = folder_id(&cli)?;
            let client = connect(&cli).await?;

            let report = sync::download_folder(&client, &folder_id, &cli.save_dir, &cli.mime_type)
                .await
                .with_context(|| format!("Failed to download from folder: {}", folder_id))?;

            println!(
                "Done. {} downloaded, {} skipped.",
                report.transferred.len(),
                report.skipped.len()
            );
        }

        Action::Upload => {
            let folder_id = folder_id(&cli)?;
            let client = connect(&cli).await?;

            let report = sync::upload_folder(&client, &folder_id, &cli.directory, &cli.pattern)
                .await
                .with_context(|| format!("Failed to upload to folder: {}", folder_id))?;

            println!(
                "Done. {} uploaded, {} skipped.",
                report.transferred.len(),
                report.skipped.len()
            );
        }
    }

    Ok(())
}

fn folder_id(cli: &Cli) -> Result<String> {
    let folder = cli
        .folder
        .as_deref()
        .context("A folder URL or ID is required for this action")?;
    extract_id(folder).with_context(|| format!("Invalid folder URL or ID: {}", folder))
}

async fn connect(cli: &Cli) -> Result<DriveClient> {
    let auth = match &cli.access_token {
        Some(token) => Authenticator::from_access_token(token.clone()),
        None => Authenticator::from_paths(&cli.credentials, &cli.token)
            .await
            .with_context(|| format!("Failed to authenticate with {:?}", cli.credentials))?,
    };
    Ok(DriveClient::new(auth))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_defaults() {
        let cli = Cli::try_parse_from(["drive_sync", "download", "1abc"]).unwrap();
        assert!(matches!(cli.action, Action::Download));
        assert_eq!(cli.folder.as_deref(), Some("1abc"));
        assert_eq!(cli.save_dir, PathBuf::from("PDF_docs"));
        assert_eq!(cli.mime_type, "application/pdf");
        assert_eq!(cli.pattern, "*.txt");
    }

    #[test]
    fn test_parse_legacy_action_names() {
        let cli = Cli::try_parse_from(["drive_sync", "convert_pdfs", "--directory", "docs"]).unwrap();
        assert!(matches!(cli.action, Action::ConvertPdf));
        assert_eq!(cli.directory, PathBuf::from("docs"));
        assert!(cli.folder.is_none());
    }

    #[test]
    fn test_folder_required_for_transfers() {
        let cli = Cli::try_parse_from(["drive_sync", "upload"]).unwrap();
        assert!(folder_id(&cli).is_err());
    }

    #[test]
    fn test_unknown_action_rejected() {
        assert!(Cli::try_parse_from(["drive_sync", "list", "1abc"]).is_err());
    }
}
