//! Port file reader
//!
//! The VPN container writes its forwarded port to a small text file, usually
//! a bare integer followed by a newline.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use forwardarr_core::domain::{DomainError, ForwardedPort};
use thiserror::Error;

/// Errors reading the port file
#[derive(Debug, Error)]
pub enum PortFileError {
    /// The file could not be read (missing, permissions, ...)
    #[error("failed to read port file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file content is not a port number in [1, 65535]
    #[error("invalid port in {}: {source}", .path.display())]
    Invalid {
        path: PathBuf,
        #[source]
        source: DomainError,
    },
}

/// Reads and validates the forwarded port from a file.
pub async fn read_port(path: &Path) -> Result<ForwardedPort, PortFileError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| PortFileError::Read {
            path: path.to_path_buf(),
            source,
        })?;

    content.parse().map_err(|source| PortFileError::Invalid {
        path: path.to_path_buf(),
        source,
    })
}

/// The port file a [`SyncEngine`](crate::SyncEngine) reconciles against
#[derive(Debug, Clone)]
pub struct PortSource {
    path: PathBuf,
}

impl PortSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name used to filter directory events
    pub fn file_name(&self) -> Option<&OsStr> {
        self.path.file_name()
    }

    pub async fn read(&self) -> Result<ForwardedPort, PortFileError> {
        read_port(&self.path).await
    }
}
