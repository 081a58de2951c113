//! Stale-session sweeper.
//!
//! Sessions are never closed explicitly by clients, so their upload
//! directories and vector collections are reclaimed here: any session
//! directory whose modification time is older than the configured timeout
//! is deleted together with its `session_<id>` collection. Runs once when
//! the server starts and on demand via `qa-harness sweep`.

use std::path::Path;
use std::time::{Duration, SystemTime};

use anyhow::Result;
use serde::Serialize;
use walkdir::WalkDir;

use crate::session::SessionId;
use crate::store::VectorStore;

/// What a sweep did, by directory name.
#[derive(Debug, Default, Clone, Serialize)]
pub struct SweepReport {
    pub removed: Vec<String>,
    pub kept: Vec<String>,
    pub failed: Vec<String>,
}

/// Delete every session directory under `upload_root` idle for longer than
/// `timeout` as of `now`, plus its collection in `store`.
///
/// A zero timeout expires every directory. A missing upload root is a
/// no-op. Failures for one session are logged and do not stop the sweep.
pub async fn sweep_stale_sessions(
    upload_root: &Path,
    timeout: Duration,
    now: SystemTime,
    store: &VectorStore,
) -> Result<SweepReport> {
    let mut report = SweepReport::default();
    if !upload_root.is_dir() {
        tracing::debug!(root = %upload_root.display(), "upload root missing; nothing to sweep");
        return Ok(report);
    }

    let walker = WalkDir::new(upload_root)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::error!(error = %e, "failed to read upload root entry");
                continue;
            }
        };
        if !entry.file_type().is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();

        let modified = match entry.metadata().map_err(anyhow::Error::from).and_then(|m| {
            m.modified().map_err(anyhow::Error::from)
        }) {
            Ok(modified) => modified,
            Err(e) => {
                tracing::error!(session = %name, error = %e, "cannot read session mtime");
                report.failed.push(name);
                continue;
            }
        };

        // Directories stamped in the future count as fresh.
        let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
        let expired = timeout.is_zero() || age > timeout;
        if !expired {
            report.kept.push(name);
            continue;
        }

        if let Err(e) = tokio::fs::remove_dir_all(entry.path()).await {
            tracing::error!(session = %name, error = %e, "failed to remove session directory");
            report.failed.push(name);
            continue;
        }

        if let Ok(session) = SessionId::parse(&name) {
            if let Err(e) = store.delete_collection(&session.collection_name()).await {
                tracing::error!(session = %name, error = %e, "failed to delete session collection");
                report.failed.push(name);
                continue;
            }
        }

        tracing::info!(session = %name, age_secs = age.as_secs(), "removed stale session");
        report.removed.push(name);
    }

    Ok(report)
}
