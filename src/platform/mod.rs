//! Platform-specific MIME definition loading.

#[cfg(unix)]
mod unix;

use crate::database::MimeDatabase;
use crate::error::Result;

/// Loads the system's shared-mime-info definitions into `db`.
#[cfg(unix)]
pub(crate) async fn load_system_definitions(db: &MimeDatabase) -> Result<()> {
    unix::load_system_definitions(db).await
}

/// No system shared-mime-info database exists on this platform.
#[cfg(not(unix))]
pub(crate) async fn load_system_definitions(_db: &MimeDatabase) -> Result<()> {
    Ok(())
}
