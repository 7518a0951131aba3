//! Write-once artifact records
//!
//! An [`ArtifactRecord`] holds immutable content, its tag and identity, and a
//! set of derived views. Every view is computed at most once, on first access,
//! behind a [`OnceCell`] (exactly-once under concurrent callers), and kept for
//! the record's lifetime.

use crate::hash::ContentHash;
use crate::key::ArtifactKey;
use crate::line_index::LineIndex;
use crate::mapping::{FlatMappingTable, LineMappingIndex, MappingError, MappingTable};
use crate::structure::{ParseError, StructureParser};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use serde_json::Value;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

/// Deferred builder of an artifact's own mapping table
///
/// Invoked at most once, with the key the record was first written under, the
/// first time the table is consumed.
pub type MappingFactory =
    Box<dyn FnOnce(&ArtifactKey) -> Result<MappingTable, MappingError> + Send + 'static>;

/// Box a closure as a [`MappingFactory`]
#[inline]
#[must_use]
pub fn mapping_factory<F>(build: F) -> MappingFactory
where
    F: FnOnce(&ArtifactKey) -> Result<MappingTable, MappingError> + Send + 'static,
{
    Box::new(build)
}

/// Immutable artifact record
///
/// # Invariants
/// - Content, tag and identity never change after construction
/// - Each derived view is computed at most once
/// - Forwarded keys share the same record (and therefore the same views)
///
/// A mapping factory must not consume the mapping views of its own record;
/// doing so would re-enter an initializing cell.
pub struct ArtifactRecord {
    key: ArtifactKey,
    content: String,
    tag: String,
    identity: Vec<String>,
    parser: Arc<dyn StructureParser>,
    factory: Mutex<Option<MappingFactory>>,

    hash: OnceCell<ContentHash>,
    line_index: OnceCell<LineIndex>,
    structure: OnceCell<Result<Arc<Value>, ParseError>>,
    mappings: OnceCell<Result<Arc<MappingTable>, MappingError>>,
    line_mappings: OnceCell<Arc<LineMappingIndex>>,
    input_mappings: OnceCell<Arc<FlatMappingTable>>,
}

impl ArtifactRecord {
    /// Create a record
    ///
    /// Without a factory the record is original: its own table is empty.
    #[must_use]
    pub fn new(
        key: ArtifactKey,
        content: impl Into<String>,
        tag: impl Into<String>,
        identity: Vec<String>,
        parser: Arc<dyn StructureParser>,
        factory: Option<MappingFactory>,
    ) -> Self {
        Self {
            key,
            content: content.into(),
            tag: tag.into(),
            identity,
            parser,
            factory: Mutex::new(factory),
            hash: OnceCell::new(),
            line_index: OnceCell::new(),
            structure: OnceCell::new(),
            mappings: OnceCell::new(),
            line_mappings: OnceCell::new(),
            input_mappings: OnceCell::new(),
        }
    }

    /// Key the record was first written under
    #[inline]
    #[must_use]
    pub fn origin_key(&self) -> &ArtifactKey {
        &self.key
    }

    /// Content text
    #[inline]
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Kind tag, used for stage selection
    #[inline]
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Absolute origins that contributed to this content
    #[inline]
    #[must_use]
    pub fn identity(&self) -> &[String] {
        &self.identity
    }

    /// Blake3 hash of the content
    #[must_use]
    pub fn content_hash(&self) -> ContentHash {
        *self.hash.get_or_init(|| ContentHash::of_text(&self.content))
    }

    /// Line-start index over the content
    #[must_use]
    pub fn line_index(&self) -> &LineIndex {
        self.line_index.get_or_init(|| LineIndex::new(&self.content))
    }

    /// Parsed structural tree
    ///
    /// The parse outcome, success or failure, is computed once.
    ///
    /// # Errors
    /// Returns [`ParseError`] if the content is not structurally parseable
    pub fn structure(&self) -> Result<Arc<Value>, ParseError> {
        self.structure
            .get_or_init(|| self.parser.parse(&self.content).map(Arc::new))
            .clone()
    }

    /// Check whether the content parses; never fails
    #[inline]
    #[must_use]
    pub fn is_structured(&self) -> bool {
        self.structure().is_ok()
    }

    /// Own mapping table, building it on first access
    ///
    /// `validate` receives the table produced by the factory (or an empty
    /// one) and may reject it. The outcome is kept, so a rejected table is
    /// reported identically on every later access.
    ///
    /// # Errors
    /// Returns the factory's or the validator's [`MappingError`]
    pub fn mappings_with<F>(&self, validate: F) -> Result<Arc<MappingTable>, MappingError>
    where
        F: FnOnce(&ArtifactKey, MappingTable) -> Result<MappingTable, MappingError>,
    {
        self.mappings
            .get_or_init(|| {
                let factory = self.factory.lock().take();
                let table = match factory {
                    Some(build) => build(&self.key)?,
                    None => MappingTable::new(),
                };
                validate(&self.key, table).map(Arc::new)
            })
            .clone()
    }

    /// Check whether the own table has been built yet
    #[inline]
    #[must_use]
    pub fn mappings_built(&self) -> bool {
        self.mappings.get().is_some()
    }

    /// Per-line index of the own mapping table
    ///
    /// # Errors
    /// Returns the [`MappingError`] of the underlying table
    pub fn line_mappings_with<F>(&self, validate: F) -> Result<Arc<LineMappingIndex>, MappingError>
    where
        F: FnOnce(&ArtifactKey, MappingTable) -> Result<MappingTable, MappingError>,
    {
        self.line_mappings
            .get_or_try_init(|| {
                let table = self.mappings_with(validate)?;
                Ok::<_, MappingError>(Arc::new(LineMappingIndex::build(&table)))
            })
            .cloned()
    }

    /// Flattened mapping table, computing it with `flatten` on first access
    ///
    /// A failed computation is not kept; the next access tries again.
    ///
    /// # Errors
    /// Returns the [`MappingError`] produced by `flatten`
    pub fn input_mappings_with<F>(&self, flatten: F) -> Result<Arc<FlatMappingTable>, MappingError>
    where
        F: FnOnce() -> Result<FlatMappingTable, MappingError>,
    {
        self.input_mappings
            .get_or_try_init(|| flatten().map(Arc::new))
            .cloned()
    }
}

impl Debug for ArtifactRecord {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtifactRecord")
            .field("key", &self.key)
            .field("tag", &self.tag)
            .field("identity", &self.identity)
            .field("content_len", &self.content.len())
            .field("mappings_built", &self.mappings_built())
            .finish_non_exhaustive()
    }
}
