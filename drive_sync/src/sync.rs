//! Name-based folder sync between Drive and a local directory.
//!
//! A file is transferred only when the destination has no entry with the
//! same name. Sizes and contents are never compared, so a re-run after a
//! partial failure simply picks up whatever is still missing.

use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};

use glob::Pattern;
use tracing::{debug, info, warn};

use crate::client::DriveClient;
use crate::error::Result;
use crate::models::format_size;

/// Page size used when listing the folder to download from.
pub const DOWNLOAD_PAGE_SIZE: u32 = 10;

/// MIME type downloaded when none is given.
pub const DEFAULT_MIME_TYPE: &str = "application/pdf";

/// Local file name pattern uploaded when none is given.
pub const DEFAULT_UPLOAD_PATTERN: &str = "*.txt";

/// Names transferred and skipped by one sync run, in processing order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub transferred: Vec<String>,
    pub skipped: Vec<String>,
}

/// Download every `mime_type` file in `folder_id` missing from `save_dir`.
///
/// `save_dir` is created if needed. All listing pages are fetched before any
/// file is considered. The first failed download aborts the run.
pub async fn download_folder(
    client: &DriveClient,
    folder_id: &str,
    save_dir: &Path,
    mime_type: &str,
) -> Result<SyncReport> {
    fs::create_dir_all(save_dir)?;

    let query = format!(
        "'{}' in parents and mimeType='{}' and trashed = false",
        escape_query(folder_id),
        escape_query(mime_type)
    );
    let files = client.list_all(&query, Some(DOWNLOAD_PAGE_SIZE)).await?;

    let mut report = SyncReport::default();
    if files.is_empty() {
        info!("No files found.");
        return Ok(report);
    }

    for file in files {
        if !is_plain_file_name(&file.name) {
            warn!("{} is not a plain file name. Skipping download.", file.name);
            report.skipped.push(file.name);
            continue;
        }

        let target = save_dir.join(&file.name);
        if target.exists() {
            info!("{} already exists. Skipping download.", file.name);
            report.skipped.push(file.name);
            continue;
        }

        info!("Downloading {}...", file.name);
        let written = client.download_to(&file.id, &target).await?;
        debug!(name = %file.name, size = %format_size(written), "download complete");
        report.transferred.push(file.name);
    }

    Ok(report)
}

/// Whether a remote name is exactly one normal path component, so joining it
/// onto the save directory cannot leave that directory.
fn is_plain_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// Upload every file in `source_dir` matching `pattern` that `folder_id`
/// does not already contain by name.
pub async fn upload_folder(
    client: &DriveClient,
    folder_id: &str,
    source_dir: &Path,
    pattern: &str,
) -> Result<SyncReport> {
    let candidates = matching_files(source_dir, pattern)?;

    let query = format!("'{}' in parents and trashed = false", escape_query(folder_id));
    let existing: HashSet<String> = client
        .list_all(&query, None)
        .await?
        .into_iter()
        .map(|file| file.name)
        .collect();
    debug!(count = existing.len(), "remote names listed");

    let mut report = SyncReport::default();
    for path in candidates {
        let name = file_name(&path);
        if existing.contains(&name) {
            info!("{} already exists in the folder. Skipping upload.", name);
            report.skipped.push(name);
            continue;
        }

        let created = client.upload_file(&path, folder_id).await?;
        info!("{} uploaded successfully with File ID: {}", name, created.id);
        report.transferred.push(name);
    }

    Ok(report)
}

/// Regular files directly inside `dir` whose names match `pattern`, sorted.
pub fn matching_files(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let pattern = Pattern::new(pattern)?;
    let mut files = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_file() && pattern.matches(&file_name(&path)) {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Escape a value for use inside a single-quoted Drive query literal.
fn escape_query(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_query() {
        assert_eq!(escape_query("plain"), "plain");
        assert_eq!(escape_query("it's"), "it\\'s");
        assert_eq!(escape_query("a\\b"), "a\\\\b");
    }

    #[test]
    fn test_plain_file_name() {
        assert!(is_plain_file_name("report.pdf"));
        assert!(is_plain_file_name("notes .. v2.pdf"));
        assert!(!is_plain_file_name("../escaped.pdf"));
        assert!(!is_plain_file_name("/etc/passwd"));
        assert!(!is_plain_file_name("sub/inner.pdf"));
        assert!(!is_plain_file_name(".."));
        assert!(!is_plain_file_name(""));
    }

    #[test]
    fn test_matching_files_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.txt"), "b").unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();
        fs::write(dir.path().join("c.pdf"), "c").unwrap();
        fs::create_dir(dir.path().join("d.txt")).unwrap();

        let files = matching_files(dir.path(), "*.txt").unwrap();
        let names: Vec<String> = files.iter().map(|p| file_name(p)).collect();
        assert_eq!(names, vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn test_matching_files_bad_pattern() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matching_files(dir.path(), "[").is_err());
    }
}
