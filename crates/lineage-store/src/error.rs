//! Error types for the store
//!
//! All errors are local to one key or one operation; the store keeps no
//! global error state and never retries.

use lineage_artifact::{ArtifactKey, MappingError, ParseError};
use std::path::PathBuf;

/// Store error
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Read of an absent key
    #[error("artifact not found: {0}")]
    NotFound(String),

    /// Explicit write to an occupied key
    #[error("write conflict: {0} already holds an artifact")]
    WriteConflict(ArtifactKey),

    /// Mutation attempted after cancellation was requested
    #[error("operation cancelled")]
    Cancelled,

    /// A mapping table names a key absent from the store
    #[error("mapping table of {artifact} references missing artifact {missing}")]
    DanglingMappingReference {
        artifact: ArtifactKey,
        missing: ArtifactKey,
    },

    /// A compiled correspondence names a source that did not contribute
    #[error("mapping table of {artifact} names unknown source '{source_name}'")]
    UnknownMappingSource {
        artifact: ArtifactKey,
        source_name: String,
    },

    /// Structural parse failure (strict structural read)
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// External resource accessor failed
    #[error("failed to fetch {uri}: {message}")]
    Fetch { uri: String, message: String },

    /// JSON encoding of dump output failed
    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// IO error while dumping
    #[error("io error writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Two dumped files would land on the same path
    #[error("dump of {key} would overwrite {path}")]
    DumpPathCollision { key: String, path: PathBuf },

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),
}

impl StoreError {
    /// Create not-found error for a key
    #[inline]
    pub fn not_found(key: impl ToString) -> Self {
        Self::NotFound(key.to_string())
    }

    /// Create IO error for path
    #[inline]
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Check if a collaborator might succeed on a later attempt
    ///
    /// Only fetch failures qualify; the store itself never retries.
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Fetch { .. })
    }
}

impl From<MappingError> for StoreError {
    fn from(err: MappingError) -> Self {
        match err {
            MappingError::DanglingReference { artifact, missing } => {
                Self::DanglingMappingReference { artifact, missing }
            }
            MappingError::UnknownSource {
                artifact,
                source_name,
            } => Self::UnknownMappingSource {
                artifact,
                source_name,
            },
        }
    }
}

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display() {
        let err = StoreError::not_found("mem://3/x");
        assert_eq!(err.to_string(), "artifact not found: mem://3/x");
    }

    #[test]
    fn mapping_error_conversion() {
        let err: StoreError = MappingError::DanglingReference {
            artifact: ArtifactKey::generated(1, "b"),
            missing: ArtifactKey::named("mem://nowhere"),
        }
        .into();
        assert!(matches!(err, StoreError::DanglingMappingReference { .. }));
        assert!(err.to_string().contains("mem://nowhere"));
    }

    #[test]
    fn only_fetch_is_retryable() {
        assert!(StoreError::Fetch {
            uri: "file:///a".into(),
            message: "timeout".into()
        }
        .is_retryable());
        assert!(!StoreError::Cancelled.is_retryable());
        assert!(!StoreError::WriteConflict(ArtifactKey::named("k")).is_retryable());
    }
}
