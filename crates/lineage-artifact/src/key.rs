//! Store-scoped artifact keys
//!
//! Provides [`ArtifactKey`], the opaque identifier every artifact is stored under.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::path::PathBuf;
use std::sync::Arc;

/// Default root of the reserved in-memory key namespace
pub const DEFAULT_SCHEME_ROOT: &str = "mem://";

/// Identifier for one artifact in a store
///
/// Keys come in two forms:
/// - `Generated`: allocated by the store from a monotonically increasing
///   counter plus a human-readable description. Two generated keys with the
///   same description are still distinct.
/// - `Named`: an absolute location supplied by the caller (explicit writes,
///   read-through materialization).
///
/// Cloning is cheap (the text is shared).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArtifactKey {
    /// Counter-allocated key
    Generated {
        /// Allocation counter value (never reused within a store)
        id: u64,
        /// Friendly description used for display and dump paths
        description: Arc<str>,
    },
    /// Caller-supplied absolute key
    Named {
        /// Absolute location, e.g. `file:///specs/petstore.yaml`
        uri: Arc<str>,
    },
}

impl ArtifactKey {
    /// Create a counter-allocated key
    #[inline]
    #[must_use]
    pub fn generated(id: u64, description: impl Into<Arc<str>>) -> Self {
        Self::Generated {
            id,
            description: description.into(),
        }
    }

    /// Create a caller-named key
    #[inline]
    #[must_use]
    pub fn named(uri: impl Into<Arc<str>>) -> Self {
        Self::Named { uri: uri.into() }
    }

    /// Friendly description (the description of a generated key, the uri of a named one)
    #[inline]
    #[must_use]
    pub fn description(&self) -> &str {
        match self {
            Self::Generated { description, .. } => description,
            Self::Named { uri } => uri,
        }
    }

    /// Allocation id, if this key was generated by a store
    #[inline]
    #[must_use]
    pub fn id(&self) -> Option<u64> {
        match self {
            Self::Generated { id, .. } => Some(*id),
            Self::Named { .. } => None,
        }
    }

    /// Check whether this key lives in the reserved in-memory namespace
    #[inline]
    #[must_use]
    pub fn is_generated(&self) -> bool {
        matches!(self, Self::Generated { .. })
    }

    /// Render the key against a scheme root
    ///
    /// Named keys are already absolute and are returned unchanged.
    #[must_use]
    pub fn render(&self, scheme_root: &str) -> String {
        match self {
            Self::Generated { id, description } => format!("{scheme_root}{id}/{description}"),
            Self::Named { uri } => uri.to_string(),
        }
    }

    /// Relative path this key's content is written to when dumping
    ///
    /// Pure function of the key: `<id>/<description>` for generated keys,
    /// `<scheme>/<rest>` for named ones. Characters outside
    /// `[A-Za-z0-9._-/]` are replaced with `_` and empty or dot-only
    /// segments are dropped.
    #[must_use]
    pub fn dump_path(&self) -> PathBuf {
        let raw = match self {
            Self::Generated { id, description } => format!("{id}/{description}"),
            Self::Named { uri } => match uri.split_once("://") {
                Some((scheme, rest)) => format!("{scheme}/{rest}"),
                None => uri.to_string(),
            },
        };

        let mut path = PathBuf::new();
        for segment in raw.split('/') {
            let clean: String = segment
                .chars()
                .map(|c| {
                    if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                        c
                    } else {
                        '_'
                    }
                })
                .collect();
            if clean.is_empty() || clean.chars().all(|c| c == '.') {
                continue;
            }
            path.push(clean);
        }
        path
    }
}

impl Display for ArtifactKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render(DEFAULT_SCHEME_ROOT))
    }
}

impl From<&str> for ArtifactKey {
    fn from(uri: &str) -> Self {
        Self::named(uri)
    }
}

impl From<String> for ArtifactKey {
    fn from(uri: String) -> Self {
        Self::named(uri)
    }
}
