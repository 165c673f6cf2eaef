//! Unix-specific MIME definition loading.
//!
//! Walks the FreeDesktop shared MIME-info package directories and ingests
//! every XML definition file found there. System-wide directories are walked
//! first and the per-user directory last: a repeated type id replaces the
//! stored record on re-ingestion, so user definitions override system ones.
//! See https://specifications.freedesktop.org/shared-mime-info-spec/ for the
//! directory layout.

use crate::database::MimeDatabase;
use crate::error::Result;
use std::path::PathBuf;
use tracing::debug;

/// System-wide package directories, in search order.
const SYSTEM_PACKAGE_DIRS: &[&str] = &[
    "/usr/local/share/mime/packages",
    "/usr/share/mime/packages",
];

/// The per-user package directory, honoring `XDG_DATA_HOME`.
fn user_package_dir() -> Option<PathBuf> {
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        if !xdg.is_empty() {
            return Some(PathBuf::from(xdg).join("mime/packages"));
        }
    }
    std::env::var("HOME")
        .ok()
        .map(|home| PathBuf::from(home).join(".local/share/mime/packages"))
}

/// Ingests every `*.xml` package in the standard directories.
///
/// Missing directories and unreadable files are skipped; a malformed
/// definition aborts with its parse error.
pub(super) async fn load_system_definitions(db: &MimeDatabase) -> Result<()> {
    let mut dirs: Vec<PathBuf> = SYSTEM_PACKAGE_DIRS.iter().map(PathBuf::from).collect();
    // The user directory goes last so its definitions win on overlap.
    if let Some(user_dir) = user_package_dir() {
        dirs.push(user_dir);
    }

    for dir in dirs {
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) => {
                debug!("skipping MIME package directory {:?}: {}", dir, e);
                continue;
            }
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "xml") {
                if let Err(e) = db.add_mime_types_file(&path).await {
                    match e {
                        crate::error::Error::Io(e) => {
                            debug!("skipping unreadable MIME package {:?}: {}", path, e);
                        }
                        other => return Err(other),
                    }
                }
            }
        }
    }

    Ok(())
}
