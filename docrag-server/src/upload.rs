//! Storage of uploaded files.

use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

/// Reduce a client-supplied file name to its final path component.
///
/// Returns `None` when nothing usable remains, e.g. for `""`, `".."` or `"dir/"`.
pub fn sanitize_filename(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next()?.trim();
    if base.is_empty() || base == "." || base == ".." {
        return None;
    }
    Some(base.to_string())
}

/// Write an upload into `dir` under its (already sanitized) name, creating the
/// directory if needed. An existing file of the same name is overwritten.
pub async fn save_upload(dir: &Path, filename: &str, bytes: &[u8]) -> io::Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(filename);
    tokio::fs::write(&path, bytes).await?;
    debug!(path = %path.display(), bytes = bytes.len(), "saved upload");
    Ok(path)
}
