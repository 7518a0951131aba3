//! Store configuration

use crate::error::{StoreError, StoreResult};
use lineage_artifact::DEFAULT_SCHEME_ROOT;
use serde::{Deserialize, Serialize};

/// Default placeholder replaced with a fetched resource's parent location
pub const DEFAULT_THIS_FOLDER_TOKEN: &str = "$(this-folder)";

/// Default tag given to artifacts materialized from external resources
pub const DEFAULT_INPUT_TAG: &str = "input-file";

/// Store configuration
///
/// Every field has a default, so a TOML document only needs the keys it
/// overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Root of the in-memory key namespace
    pub scheme_root: String,
    /// Placeholder token substituted by the read-through view
    pub this_folder_token: String,
    /// Tag for read-through artifacts
    pub input_tag: String,
    /// Pretty-print dumped mapping tables
    pub pretty_dump: bool,
    /// Write `index.json` beside dumped artifacts
    pub write_dump_manifest: bool,
}

impl StoreConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse configuration from TOML text
    ///
    /// # Errors
    /// Returns [`StoreError::Config`] on malformed TOML or an empty scheme root
    pub fn from_toml_str(text: &str) -> StoreResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| StoreError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check configuration invariants
    ///
    /// # Errors
    /// Returns [`StoreError::Config`] if the scheme root or input tag is empty
    pub fn validate(&self) -> StoreResult<()> {
        if self.scheme_root.is_empty() {
            return Err(StoreError::Config("scheme_root must not be empty".into()));
        }
        if self.input_tag.is_empty() {
            return Err(StoreError::Config("input_tag must not be empty".into()));
        }
        Ok(())
    }

    /// With scheme root
    #[inline]
    #[must_use]
    pub fn with_scheme_root(mut self, root: impl Into<String>) -> Self {
        self.scheme_root = root.into();
        self
    }

    /// With folder placeholder token
    #[inline]
    #[must_use]
    pub fn with_this_folder_token(mut self, token: impl Into<String>) -> Self {
        self.this_folder_token = token.into();
        self
    }

    /// With read-through input tag
    #[inline]
    #[must_use]
    pub fn with_input_tag(mut self, tag: impl Into<String>) -> Self {
        self.input_tag = tag.into();
        self
    }

    /// With pretty-printed dumps
    #[inline]
    #[must_use]
    pub fn with_pretty_dump(mut self, pretty: bool) -> Self {
        self.pretty_dump = pretty;
        self
    }

    /// With or without the dump manifest
    #[inline]
    #[must_use]
    pub fn with_dump_manifest(mut self, enabled: bool) -> Self {
        self.write_dump_manifest = enabled;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            scheme_root: DEFAULT_SCHEME_ROOT.to_string(),
            this_folder_token: DEFAULT_THIS_FOLDER_TOKEN.to_string(),
            input_tag: DEFAULT_INPUT_TAG.to_string(),
            pretty_dump: true,
            write_dump_manifest: true,
        }
    }
}
