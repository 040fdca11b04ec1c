//! Folder identifiers given as raw IDs or pasted Drive links.

use regex::Regex;
use std::sync::LazyLock;

use crate::error::{DriveError, Result};

/// Drive links carrying an ID: folder views (optionally under `/u/<n>/`),
/// file views and legacy `open?id=` links.
static DRIVE_LINK_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^https?://drive\.google\.com/(?:drive/(?:u/\d+/)?folders/|file/d/|open\?id=)([A-Za-z0-9_-]+)",
    )
    .expect("Invalid Drive link regex")
});

static ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("Invalid ID regex"));

/// Resolve a folder argument to a bare Drive ID.
///
/// ```
/// use drive_sync::url_parser::extract_id;
///
/// let id = extract_id("https://drive.google.com/drive/u/1/folders/1abc?usp=sharing").unwrap();
/// assert_eq!(id, "1abc");
/// assert_eq!(extract_id(" 1abc ").unwrap(), "1abc");
/// ```
pub fn extract_id(url_or_id: &str) -> Result<String> {
    let trimmed = url_or_id.trim();

    if let Some(id) = DRIVE_LINK_REGEX.captures(trimmed).and_then(|c| c.get(1)) {
        return Ok(id.as_str().to_string());
    }

    if ID_REGEX.is_match(trimmed) {
        return Ok(trimmed.to_string());
    }

    Err(DriveError::InvalidUrlOrId(url_or_id.to_string()))
}
