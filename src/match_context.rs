//! Lazy, cached prefix reader used during file matching.

use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::debug;

/// Maximum number of bytes read from a file for content matching.
///
/// A single bounded prefix is read; rules pointing past it simply fail. The
/// cap can be raised per context with [`FileMatchContext::with_max_data`].
pub const MAX_DATA: usize = 2500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Not read yet.
    DataNotRead,
    /// Prefix available in the cache.
    DataRead,
    /// File cannot be read or does not exist.
    NoDataAvailable,
}

/// One-shot reading context for matching a single file.
///
/// The file name is available unconditionally, so glob matching works even
/// when the file cannot be opened. The content prefix is read on first use of
/// [`data`](FileMatchContext::data) and cached; an open or read failure turns
/// the context into a permanent empty-data state instead of an error, and the
/// lookup falls back to name-based matching.
#[derive(Debug)]
pub struct FileMatchContext {
    path: Option<PathBuf>,
    file_name: String,
    max_data: usize,
    state: State,
    data: Vec<u8>,
}

impl FileMatchContext {
    /// Context over a file on disk. No I/O happens until `data()` is called.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self::with_max_data(path, MAX_DATA)
    }

    /// Like [`new`](FileMatchContext::new) with a custom prefix cap.
    pub fn with_max_data(path: impl AsRef<Path>, max_data: usize) -> Self {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            path: Some(path.to_path_buf()),
            file_name,
            max_data,
            state: State::DataNotRead,
            data: Vec::new(),
        }
    }

    /// Context over an in-memory buffer, e.g. data that was already read by
    /// the caller. The buffer is truncated to the prefix cap.
    pub fn from_bytes(file_name: &str, bytes: &[u8]) -> Self {
        let mut data = bytes.to_vec();
        data.truncate(MAX_DATA);
        Self {
            path: None,
            file_name: file_name.to_string(),
            max_data: MAX_DATA,
            state: State::DataRead,
            data,
        }
    }

    /// The displayed file name, for glob matching.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Returns the cached first `max_data` bytes of the source, reading them
    /// on the first call.
    pub async fn data(&mut self) -> &[u8] {
        if self.state == State::DataNotRead {
            match self.read_prefix().await {
                Ok(data) => {
                    self.data = data;
                    self.state = State::DataRead;
                }
                Err(e) => {
                    debug!("cannot read {:?} for content matching: {}", self.file_name, e);
                    self.state = State::NoDataAvailable;
                }
            }
        }
        &self.data
    }

    async fn read_prefix(&self) -> std::io::Result<Vec<u8>> {
        let path = self
            .path
            .as_deref()
            .ok_or_else(|| std::io::Error::from(std::io::ErrorKind::NotFound))?;
        let mut file = File::open(path).await?;
        let mut data = vec![0u8; self.max_data];
        let mut filled = 0;
        while filled < data.len() {
            let n = file.read(&mut data[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        data.truncate(filled);
        Ok(data)
    }
}
