use std::path::PathBuf;

use thiserror::Error;

/// Failures surfaced by the remote library client.
///
/// The status core only distinguishes [`ApiError::PermissionDenied`] from
/// everything else; the other variants exist for the log file.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("can't connect to host {host}: {message}")]
    HostUnreachable { host: String, message: String },
    #[error("permission denied")]
    PermissionDenied,
    #[error("server returned status {status} for {url}")]
    Status { status: u16, url: String },
    #[error("failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },
}

impl ApiError {
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, ApiError::PermissionDenied)
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("couldn't find path {}", .0.display())]
    RootNotFound(PathBuf),
    #[error("no storage roots configured")]
    NoRoots,
    #[error("no other storage root configured")]
    NoAlternateRoot,
    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("server.host is empty; set it in the config file or ROMM_HOST")]
    MissingHost,
}

/// Per-item failures inside the download worker.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid archive {}: {message}", path.display())]
    Archive { path: PathBuf, message: String },
}

impl DownloadError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        DownloadError::Io { path: path.to_path_buf(), source }
    }
}
