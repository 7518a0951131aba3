//! External resource accessors
//!
//! The read-through view fetches text it has not seen through a
//! [`ResourceAccessor`]. Retries, if any, belong to the accessor.

use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use std::fmt::Debug;
use std::io::ErrorKind;
use std::path::PathBuf;

/// Fetches external text by uri
#[async_trait]
pub trait ResourceAccessor: Send + Sync + Debug {
    /// Fetch the text at `uri`, `None` if no resource exists there
    ///
    /// # Errors
    /// - `StoreError::Fetch` if the resource exists but cannot be read
    async fn fetch(&self, uri: &str) -> StoreResult<Option<String>>;
}

/// Reads `file://` uris and bare paths from the local filesystem
#[derive(Debug, Clone, Default)]
pub struct FileSystemAccessor {
    root: Option<PathBuf>,
}

impl FileSystemAccessor {
    /// Create accessor resolving relative paths against the working directory
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create accessor resolving relative paths against `root`
    #[inline]
    #[must_use]
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    /// Local path for a uri, `None` for non-file schemes
    #[must_use]
    pub fn local_path(&self, uri: &str) -> Option<PathBuf> {
        let raw = match uri.split_once("://") {
            Some(("file", rest)) => rest,
            Some(_) => return None,
            None => uri,
        };
        let path = PathBuf::from(raw);
        Some(match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path,
        })
    }
}

#[async_trait]
impl ResourceAccessor for FileSystemAccessor {
    async fn fetch(&self, uri: &str) -> StoreResult<Option<String>> {
        let Some(path) = self.local_path(uri) else {
            tracing::debug!("No filesystem resource for non-file uri {}", uri);
            return Ok(None);
        };

        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Fetch {
                uri: uri.to_string(),
                message: e.to_string(),
            }),
        }
    }
}
