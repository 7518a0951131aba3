//! Write capability handed to pipeline stages
//!
//! A [`Sink`] can only create new artifacts. It never reads arbitrary keys.

use crate::blame::compile;
use crate::error::{StoreError, StoreResult};
use crate::store::{ArtifactHandle, DataStore};
use lineage_artifact::{
    mapping_factory, stringify, ArtifactKey, Correspondence, MappingError, MappingFactory,
    MappingTable,
};
use serde::Serialize;

/// Tag used by [`Sink::write_structured`] when none is given
pub const STRUCTURED_TAG: &str = "json";

/// Write-only view over a [`DataStore`]
#[derive(Debug, Clone)]
pub struct Sink {
    store: DataStore,
}

impl Sink {
    /// Create sink over store
    #[inline]
    #[must_use]
    pub fn new(store: DataStore) -> Self {
        Self { store }
    }

    /// Write content under a fresh key
    ///
    /// # Errors
    /// - `StoreError::Cancelled` if cancellation was requested
    pub fn write(
        &self,
        description: &str,
        content: impl Into<String>,
        tag: &str,
        identity: Vec<String>,
        mappings: Option<MappingFactory>,
    ) -> StoreResult<ArtifactHandle> {
        self.store.write(description, content, tag, identity, mappings)
    }

    /// Write original content without a mapping table
    ///
    /// # Errors
    /// - `StoreError::Cancelled` if cancellation was requested
    #[inline]
    pub fn write_text(
        &self,
        description: &str,
        content: impl Into<String>,
        tag: &str,
        identity: Vec<String>,
    ) -> StoreResult<ArtifactHandle> {
        self.write(description, content, tag, identity, None)
    }

    /// Write derived content whose mapping table is built lazily by `build`
    ///
    /// `build` receives the new artifact's own key.
    ///
    /// # Errors
    /// - `StoreError::Cancelled` if cancellation was requested
    pub fn write_mapped<F>(
        &self,
        description: &str,
        content: impl Into<String>,
        tag: &str,
        identity: Vec<String>,
        build: F,
    ) -> StoreResult<ArtifactHandle>
    where
        F: FnOnce(&ArtifactKey) -> Result<MappingTable, MappingError> + Send + 'static,
    {
        self.write(description, content, tag, identity, Some(mapping_factory(build)))
    }

    /// Alias an existing artifact under a new key
    ///
    /// # Errors
    /// - `StoreError::Cancelled` if cancellation was requested
    #[inline]
    pub fn forward(&self, description: &str, handle: &ArtifactHandle) -> StoreResult<ArtifactHandle> {
        self.store.forward(description, handle)
    }

    /// Serialize a value to JSON text and write it with declared provenance
    ///
    /// Each correspondence names one of `mapping_sources` by key text or
    /// description. The table is compiled on first access, so an unknown
    /// source name surfaces there rather than here.
    ///
    /// # Errors
    /// - `StoreError::Parse` if the value cannot be serialized
    /// - `StoreError::Cancelled` if cancellation was requested
    pub fn write_structured<T>(
        &self,
        description: &str,
        value: &T,
        identity: Vec<String>,
        tag: Option<&str>,
        mappings: Vec<Correspondence>,
        mapping_sources: Vec<ArtifactHandle>,
    ) -> StoreResult<ArtifactHandle>
    where
        T: Serialize + ?Sized,
    {
        let content = stringify(value).map_err(StoreError::Parse)?;

        let factory = if mappings.is_empty() {
            None
        } else {
            // Keys only; holding handles here would make records own their store
            let sources: Vec<ArtifactKey> = mapping_sources.iter().map(|h| h.key().clone()).collect();
            let scheme_root = self.store.config().scheme_root.clone();
            Some(mapping_factory(move |own| compile(own, &mappings, &sources, &scheme_root)))
        };

        self.write(
            description,
            content,
            tag.unwrap_or(STRUCTURED_TAG),
            identity,
            factory,
        )
    }
}

impl DataStore {
    /// Write capability over this store
    #[inline]
    #[must_use]
    pub fn sink(&self) -> Sink {
        Sink::new(self.clone())
    }
}
