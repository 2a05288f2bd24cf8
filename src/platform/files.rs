//! File-system access by URI
//!
//! Captures are handed around as `file://` URIs; this module turns them back
//! into paths and reads them as text.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::io;
use std::path::{Path, PathBuf};
use url::Url;

/// How file contents are turned into a string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Utf8,
    Base64,
}

/// Resolve a `file://` URI (or a plain path) to a local path
pub fn uri_to_path(uri: &str) -> io::Result<PathBuf> {
    if !uri.starts_with("file:") {
        return Ok(PathBuf::from(uri));
    }

    Url::parse(uri)
        .ok()
        .and_then(|url| url.to_file_path().ok())
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("not a local file URI: {}", uri),
            )
        })
}

/// Build a `file://` URI for an absolute path
pub fn path_to_uri(path: &Path) -> Option<String> {
    Url::from_file_path(path).ok().map(|url| url.to_string())
}

/// Read the whole resource at `uri` as a string
pub async fn read_as_string(uri: &str, encoding: Encoding) -> io::Result<String> {
    let path = uri_to_path(uri)?;
    let bytes = tokio::fs::read(&path).await?;

    match encoding {
        Encoding::Utf8 => {
            String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
        }
        Encoding::Base64 => Ok(STANDARD.encode(bytes)),
    }
}
