//! File stream provider
//!
//! Every lookup is recomputed per request: nothing about the filesystem is
//! cached, so files added or removed under the root are seen immediately.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use tokio::fs::File;

use crate::error::AssetError;

/// Resolved location of an asset under the public root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub absolute_path: PathBuf,
    /// Extension including the leading dot (`".mp3"`), empty if none
    pub extension: String,
}

impl FileInfo {
    pub fn content_type(&self) -> &'static str {
        content_type_for(&self.extension)
    }
}

/// An opened asset; the reader is closed when dropped
#[derive(Debug)]
pub struct FileStream {
    pub info: FileInfo,
    pub reader: File,
}

/// Map a dotted extension to the `Content-Type` served for it
pub fn content_type_for(extension: &str) -> &'static str {
    match extension.to_ascii_lowercase().as_str() {
        ".html" => "text/html",
        ".css" => "text/css",
        ".js" => "text/javascript",
        ".mp3" => "audio/mpeg",
        _ => "application/octet-stream",
    }
}

/// Opens files that live under one fixed public root
#[derive(Debug, Clone)]
pub struct FileStreamProvider {
    root: PathBuf,
}

impl FileStreamProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve a request path to an existing regular file under the root
    pub async fn resolve(&self, relative_path: &str) -> Result<FileInfo, AssetError> {
        let absolute_path = self.join(relative_path)?;

        let metadata = tokio::fs::metadata(&absolute_path)
            .await
            .map_err(|e| map_open_error(relative_path, e))?;
        if !metadata.is_file() {
            return Err(AssetError::NotFound(relative_path.to_string()));
        }

        let extension = absolute_path
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();

        Ok(FileInfo {
            absolute_path,
            extension,
        })
    }

    /// Open an already resolved file for sequential reading
    pub async fn open(&self, info: FileInfo) -> Result<FileStream, AssetError> {
        let reader = File::open(&info.absolute_path).await.map_err(|e| {
            map_open_error(&info.absolute_path.to_string_lossy(), e)
        })?;
        Ok(FileStream { info, reader })
    }

    /// Resolve and open in one step
    pub async fn open_stream(&self, relative_path: &str) -> Result<FileStream, AssetError> {
        let info = self.resolve(relative_path).await?;
        self.open(info).await
    }

    /// Join a request path onto the root.
    ///
    /// Parent-directory and absolute components are refused so that a
    /// request can never name a file outside the root.
    fn join(&self, relative_path: &str) -> Result<PathBuf, AssetError> {
        let trimmed = relative_path.trim_start_matches('/');
        let mut path = self.root.clone();

        for component in Path::new(trimmed).components() {
            match component {
                Component::Normal(part) => path.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    tracing::warn!(path = relative_path, "Rejected asset path outside public root");
                    return Err(AssetError::OutsideRoot(relative_path.to_string()));
                }
            }
        }

        Ok(path)
    }
}

fn map_open_error(path: &str, err: std::io::Error) -> AssetError {
    match err.kind() {
        ErrorKind::NotFound | ErrorKind::PermissionDenied => AssetError::NotFound(path.to_string()),
        _ => AssetError::Io(err),
    }
}
