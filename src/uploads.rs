//! Per-session upload directories.
//!
//! Uploaded files land in `<upload_dir>/<session_id>/<file_name>`. The
//! directory is created lazily on first upload and removed by
//! `session delete` or the stale-session sweeper.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::session::SessionId;

/// Reduce a client-supplied file name to its final path component.
///
/// Both `/` and `\` count as separators. Returns `None` when nothing usable
/// remains (empty, `.` or `..`).
pub fn sanitize_file_name(raw: &str) -> Option<String> {
    let name = raw.rsplit(['/', '\\']).next().unwrap_or("").trim();
    match name {
        "" | "." | ".." => None,
        _ => Some(name.to_string()),
    }
}

/// Write one uploaded file into the session's directory, replacing any file
/// of the same name. Returns the stored path.
pub async fn save_upload(
    upload_root: &Path,
    session: &SessionId,
    file_name: &str,
    bytes: &[u8],
) -> Result<PathBuf> {
    let name = sanitize_file_name(file_name)
        .with_context(|| format!("unusable upload file name {:?}", file_name))?;
    let dir = session.upload_dir(upload_root);
    tokio::fs::create_dir_all(&dir)
        .await
        .with_context(|| format!("creating {}", dir.display()))?;

    let path = dir.join(name);
    tokio::fs::write(&path, bytes)
        .await
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

/// First `.html` file (case-insensitive extension) in the session's upload
/// directory, by file name. `None` when the directory or the file is absent.
pub fn find_html(upload_root: &Path, session: &SessionId) -> Result<Option<PathBuf>> {
    let dir = session.upload_dir(upload_root);
    if !dir.is_dir() {
        return Ok(None);
    }

    let walker = WalkDir::new(&dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name();
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let is_html = entry
            .path()
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("html"));
        if is_html {
            return Ok(Some(entry.into_path()));
        }
    }
    Ok(None)
}

/// Remove the session's upload directory. Returns `false` if it did not exist.
pub async fn remove_session_dir(upload_root: &Path, session: &SessionId) -> Result<bool> {
    let dir = session.upload_dir(upload_root);
    match tokio::fs::remove_dir_all(&dir).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e).with_context(|| format!("removing {}", dir.display())),
    }
}
