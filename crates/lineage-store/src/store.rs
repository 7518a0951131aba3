//! Write-once artifact store
//!
//! The [`DataStore`] exclusively owns every [`ArtifactRecord`]. Callers hold
//! [`ArtifactHandle`]s, which share the record rather than copying content.
//!
//! # Invariants
//! - A key, once written, is never rewritten
//! - Keys are never reused; every generated key comes from a fresh counter value
//! - Forwarding aliases a record under a new key; nothing is copied
//! - After cancellation no mutation takes effect

use crate::cancel::CancellationFlag;
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use lineage_artifact::{
    ArtifactKey, ArtifactRecord, ContentHash, FlatMappingTable, LineIndex, LineMappingIndex,
    MappingError, MappingFactory, MappingTable, StructureParser, YamlStructure,
};
use parking_lot::Mutex;
use serde_json::Value;
use std::fmt::{self, Debug, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// In-memory artifact store for one pipeline run
///
/// Cheap to clone; clones share the same records.
#[derive(Clone)]
pub struct DataStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    config: StoreConfig,
    parser: Arc<dyn StructureParser>,
    records: DashMap<ArtifactKey, Arc<ArtifactRecord>>,
    by_text: DashMap<String, ArtifactKey>,
    order: Mutex<Vec<ArtifactKey>>,
    counter: AtomicU64,
    cancellation: CancellationFlag,
}

impl DataStore {
    /// Create store with default configuration and the YAML parser
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Create store with configuration
    #[inline]
    #[must_use]
    pub fn with_config(config: StoreConfig) -> Self {
        Self::with_parser(config, Arc::new(YamlStructure))
    }

    /// Create store with configuration and structural parser
    #[must_use]
    pub fn with_parser(config: StoreConfig, parser: Arc<dyn StructureParser>) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                config,
                parser,
                records: DashMap::new(),
                by_text: DashMap::new(),
                order: Mutex::new(Vec::new()),
                counter: AtomicU64::new(0),
                cancellation: CancellationFlag::new(),
            }),
        }
    }

    /// Store configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    /// Shared cancellation flag
    #[inline]
    #[must_use]
    pub fn cancellation(&self) -> CancellationFlag {
        self.inner.cancellation.clone()
    }

    /// Request cancellation of all further mutations
    #[inline]
    pub fn cancel(&self) {
        self.inner.cancellation.cancel();
    }

    /// Check whether cancellation was requested
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancellation.is_cancelled()
    }

    /// Write new content under a freshly allocated key
    ///
    /// The mapping factory, if any, runs lazily on first consumption of the
    /// artifact's provenance; a dangling reference is reported there, not here.
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
        self.ensure_active("write", description)?;
        let key = self.allocate_key(description);
        let record = ArtifactRecord::new(
            key.clone(),
            content,
            tag,
            identity,
            Arc::clone(&self.inner.parser),
            mappings,
        );
        self.insert(key, Arc::new(record))
    }

    /// Write original content under a caller-supplied key
    ///
    /// # Errors
    /// - `StoreError::Cancelled` if cancellation was requested
    /// - `StoreError::WriteConflict` if the key already holds an artifact
    pub fn write_explicit(
        &self,
        key: impl Into<ArtifactKey>,
        content: impl Into<String>,
        tag: &str,
        identity: Vec<String>,
    ) -> StoreResult<ArtifactHandle> {
        let key = key.into();
        self.ensure_active("explicit write", key.description())?;
        let record = ArtifactRecord::new(
            key.clone(),
            content,
            tag,
            identity,
            Arc::clone(&self.inner.parser),
            None,
        );
        self.insert(key, Arc::new(record))
    }

    /// Alias an existing artifact under a new key
    ///
    /// Both keys resolve to the same record: same content, identity and views.
    ///
    /// # Errors
    /// - `StoreError::Cancelled` if cancellation was requested
    pub fn forward(&self, description: &str, source: &ArtifactHandle) -> StoreResult<ArtifactHandle> {
        self.ensure_active("forward", description)?;
        let key = self.allocate_key(description);
        self.insert(key, Arc::clone(&source.record))
    }

    /// Read an artifact
    ///
    /// The in-memory store answers without suspending; the async signature
    /// matches the [`Source`](crate::source::Source) read paths.
    ///
    /// # Errors
    /// - `StoreError::NotFound` if the key is absent
    pub async fn read(&self, key: &ArtifactKey) -> StoreResult<ArtifactHandle> {
        self.read_sync(key)
    }

    /// Read an artifact without suspending
    ///
    /// # Errors
    /// - `StoreError::NotFound` if the key is absent
    pub fn read_sync(&self, key: &ArtifactKey) -> StoreResult<ArtifactHandle> {
        self.get(key).ok_or_else(|| StoreError::not_found(self.render(key)))
    }

    /// Look up an artifact, if present
    #[must_use]
    pub fn get(&self, key: &ArtifactKey) -> Option<ArtifactHandle> {
        let record = self.inner.records.get(key).map(|r| Arc::clone(r.value()))?;
        Some(self.handle(key.clone(), record))
    }

    /// Look up an artifact by its rendered key text
    #[must_use]
    pub fn get_by_text(&self, text: &str) -> Option<ArtifactHandle> {
        let key = self.inner.by_text.get(text).map(|k| k.value().clone())?;
        self.get(&key)
    }

    /// Check if key holds an artifact
    #[inline]
    #[must_use]
    pub fn contains(&self, key: &ArtifactKey) -> bool {
        self.inner.records.contains_key(key)
    }

    /// Number of keys (aliases counted separately)
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.records.len()
    }

    /// Check if store is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.records.is_empty()
    }

    /// All keys in insertion order
    #[must_use]
    pub fn keys(&self) -> Vec<ArtifactKey> {
        self.inner.order.lock().clone()
    }

    /// Handles for all keys in insertion order
    #[must_use]
    pub fn handles(&self) -> Vec<ArtifactHandle> {
        self.keys().iter().filter_map(|key| self.get(key)).collect()
    }

    /// Keys whose content hashes to `hash`, in insertion order
    #[must_use]
    pub fn find_by_hash(&self, hash: &ContentHash) -> Vec<ArtifactKey> {
        self.handles()
            .into_iter()
            .filter(|handle| handle.content_hash() == *hash)
            .map(|handle| handle.key)
            .collect()
    }

    /// Render a key against this store's scheme root
    #[inline]
    #[must_use]
    pub fn render(&self, key: &ArtifactKey) -> String {
        key.render(&self.inner.config.scheme_root)
    }

    /// Own mapping table of an artifact
    ///
    /// # Errors
    /// - `StoreError::NotFound` if the key is absent
    /// - `StoreError::DanglingMappingReference` if the table names a missing key
    pub fn mappings(&self, key: &ArtifactKey) -> StoreResult<Arc<MappingTable>> {
        self.read_sync(key)?.mappings()
    }

    /// Flattened mapping table of an artifact
    ///
    /// # Errors
    /// - `StoreError::NotFound` if the key is absent
    /// - `StoreError::DanglingMappingReference` if any hop names a missing key
    pub fn input_mappings(&self, key: &ArtifactKey) -> StoreResult<Arc<FlatMappingTable>> {
        self.read_sync(key)?.input_mappings()
    }

    pub(crate) fn record_for_hop(
        &self,
        from: &ArtifactKey,
        key: &ArtifactKey,
    ) -> Result<Arc<ArtifactRecord>, MappingError> {
        self.inner
            .records
            .get(key)
            .map(|r| Arc::clone(r.value()))
            .ok_or_else(|| MappingError::DanglingReference {
                artifact: from.clone(),
                missing: key.clone(),
            })
    }

    /// Reject tables naming keys that are not in the store
    pub(crate) fn validate_table(
        &self,
        artifact: &ArtifactKey,
        table: MappingTable,
    ) -> Result<MappingTable, MappingError> {
        if let Some(missing) = table.sources().into_iter().find(|k| !self.contains(k)) {
            tracing::warn!("Mapping table of {} references missing {}", artifact, missing);
            return Err(MappingError::DanglingReference {
                artifact: artifact.clone(),
                missing: missing.clone(),
            });
        }
        Ok(table)
    }

    fn ensure_active(&self, operation: &str, target: &str) -> StoreResult<()> {
        if self.is_cancelled() {
            tracing::warn!("Refusing {} of '{}': store cancelled", operation, target);
            return Err(StoreError::Cancelled);
        }
        Ok(())
    }

    fn allocate_key(&self, description: &str) -> ArtifactKey {
        let id = self.inner.counter.fetch_add(1, Ordering::SeqCst);
        ArtifactKey::generated(id, description)
    }

    fn insert(&self, key: ArtifactKey, record: Arc<ArtifactRecord>) -> StoreResult<ArtifactHandle> {
        match self.inner.records.entry(key.clone()) {
            Entry::Occupied(_) => {
                tracing::warn!("Write conflict on {}", key);
                return Err(StoreError::WriteConflict(key));
            }
            Entry::Vacant(slot) => {
                slot.insert(Arc::clone(&record));
                self.inner.order.lock().push(key.clone());
            }
        }
        self.inner.by_text.insert(self.render(&key), key.clone());

        tracing::debug!(
            "Stored {} (tag: {}, {} bytes)",
            self.render(&key),
            record.tag(),
            record.content().len()
        );
        Ok(self.handle(key, record))
    }

    fn handle(&self, key: ArtifactKey, record: Arc<ArtifactRecord>) -> ArtifactHandle {
        ArtifactHandle {
            key,
            record,
            store: self.clone(),
        }
    }
}

impl Default for DataStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for DataStore {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataStore")
            .field("len", &self.len())
            .field("scheme_root", &self.inner.config.scheme_root)
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// Reference to one stored artifact
///
/// Holds the key and shares the record; never copies content. Two handles
/// for the same key are interchangeable.
#[derive(Clone)]
pub struct ArtifactHandle {
    key: ArtifactKey,
    record: Arc<ArtifactRecord>,
    store: DataStore,
}

impl ArtifactHandle {
    /// Key this handle was obtained for
    #[inline]
    #[must_use]
    pub fn key(&self) -> &ArtifactKey {
        &self.key
    }

    /// Key rendered against the owning store's scheme root
    #[inline]
    #[must_use]
    pub fn key_text(&self) -> String {
        self.store.render(&self.key)
    }

    /// Friendly description of the key
    #[inline]
    #[must_use]
    pub fn description(&self) -> &str {
        self.key.description()
    }

    /// Content text
    #[inline]
    #[must_use]
    pub fn content(&self) -> &str {
        self.record.content()
    }

    /// Kind tag
    #[inline]
    #[must_use]
    pub fn tag(&self) -> &str {
        self.record.tag()
    }

    /// Absolute origins of this content
    #[inline]
    #[must_use]
    pub fn identity(&self) -> &[String] {
        self.record.identity()
    }

    /// Blake3 hash of the content
    #[inline]
    #[must_use]
    pub fn content_hash(&self) -> ContentHash {
        self.record.content_hash()
    }

    /// Line-start index over the content
    #[inline]
    #[must_use]
    pub fn line_index(&self) -> &LineIndex {
        self.record.line_index()
    }

    /// Parsed structural tree
    ///
    /// # Errors
    /// - `StoreError::Parse` if the content is not structurally parseable
    pub fn structure(&self) -> StoreResult<Arc<Value>> {
        Ok(self.record.structure()?)
    }

    /// Check whether the content parses; never fails
    #[inline]
    #[must_use]
    pub fn is_structured(&self) -> bool {
        self.record.is_structured()
    }

    /// Own mapping table (empty for original content)
    ///
    /// # Errors
    /// - `StoreError::DanglingMappingReference` if the table names a missing key
    pub fn mappings(&self) -> StoreResult<Arc<MappingTable>> {
        Ok(self
            .record
            .mappings_with(|artifact, table| self.store.validate_table(artifact, table))?)
    }

    /// Own mapping table bucketed by generated line
    ///
    /// # Errors
    /// - `StoreError::DanglingMappingReference` if the table names a missing key
    pub fn line_mappings(&self) -> StoreResult<Arc<LineMappingIndex>> {
        Ok(self.record_line_mappings()?)
    }

    /// Flattened mapping table naming only terminal sources
    ///
    /// Computed once, on first access, by blaming every own-table entry.
    ///
    /// # Errors
    /// - `StoreError::DanglingMappingReference` if any hop names a missing key
    pub fn input_mappings(&self) -> StoreResult<Arc<FlatMappingTable>> {
        let flat = self
            .record
            .input_mappings_with(|| self.store.flatten_record(&self.key, &self.record))?;
        Ok(flat)
    }

    /// Check whether two handles share one record (same key or forwarded)
    #[inline]
    #[must_use]
    pub fn shares_record_with(&self, other: &ArtifactHandle) -> bool {
        Arc::ptr_eq(&self.record, &other.record)
    }

    /// Underlying record
    #[inline]
    #[must_use]
    pub fn record(&self) -> &ArtifactRecord {
        &self.record
    }

    /// Owning store
    #[inline]
    #[must_use]
    pub fn store(&self) -> &DataStore {
        &self.store
    }

    pub(crate) fn record_line_mappings(&self) -> Result<Arc<LineMappingIndex>, MappingError> {
        self.record
            .line_mappings_with(|artifact, table| self.store.validate_table(artifact, table))
    }
}

impl PartialEq for ArtifactHandle {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && Arc::ptr_eq(&self.store.inner, &other.store.inner)
    }
}

impl Eq for ArtifactHandle {}

impl Debug for ArtifactHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtifactHandle")
            .field("key", &self.key_text())
            .field("tag", &self.tag())
            .field("content_len", &self.content().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lineage_artifact::{mapping_factory, Mapping};

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| (*v).to_string()).collect()
    }

    #[test]
    fn write_then_read_roundtrip() {
        let store = DataStore::new();
        let written = store.write("d", "hello", "text", ids(&["id"]), None).unwrap();

        let read = store.read_sync(written.key()).unwrap();
        assert_eq!(read.content(), "hello");
        assert_eq!(read.identity(), ["id".to_string()]);
        assert_eq!(read.tag(), "text");
        assert_eq!(read, written);
    }

    #[tokio::test]
    async fn async_read_matches_sync_read() {
        let store = DataStore::new();
        let written = store.write("d", "x", "text", vec![], None).unwrap();
        let read = store.read(written.key()).await.unwrap();
        assert_eq!(read.content(), "x");
    }

    #[test]
    fn same_description_yields_distinct_keys() {
        let store = DataStore::new();
        let a = store.write("same", "1", "text", vec![], None).unwrap();
        let b = store.write("same", "2", "text", vec![], None).unwrap();
        assert_ne!(a.key(), b.key());
        assert_eq!(store.read_sync(a.key()).unwrap().content(), "1");
        assert_eq!(store.read_sync(b.key()).unwrap().content(), "2");
    }

    #[test]
    fn explicit_write_is_write_once() {
        let store = DataStore::new();
        store.write_explicit("file:///k", "first", "text", vec![]).unwrap();

        let second = store.write_explicit("file:///k", "second", "text", vec![]);
        assert!(matches!(second, Err(StoreError::WriteConflict(_))));
        let read = store.read_sync(&ArtifactKey::named("file:///k")).unwrap();
        assert_eq!(read.content(), "first");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn forward_shares_record() {
        let store = DataStore::new();
        let a = store.write("a", "foo", "text", ids(&["x"]), None).unwrap();
        let b = store.forward("b", &a).unwrap();

        assert_ne!(a.key(), b.key());
        let read = store.read_sync(b.key()).unwrap();
        assert_eq!(read.content(), "foo");
        assert_eq!(read.identity(), a.identity());
        assert!(read.shares_record_with(&a));
    }

    #[test]
    fn read_missing_is_not_found() {
        let store = DataStore::new();
        let result = store.read_sync(&ArtifactKey::generated(99, "ghost"));
        assert!(matches!(result, Err(StoreError::NotFound(text)) if text == "mem://99/ghost"));
    }

    #[test]
    fn cancelled_store_refuses_mutation() {
        let store = DataStore::new();
        let a = store.write("a", "foo", "text", vec![], None).unwrap();
        store.cancel();

        assert!(matches!(store.write("b", "x", "text", vec![], None), Err(StoreError::Cancelled)));
        assert!(matches!(store.write_explicit("file:///c", "x", "text", vec![]), Err(StoreError::Cancelled)));
        assert!(matches!(store.forward("d", &a), Err(StoreError::Cancelled)));
        assert_eq!(store.len(), 1);
        assert!(store.read_sync(a.key()).is_ok());
    }

    #[test]
    fn dangling_reference_surfaces_on_first_access() {
        let store = DataStore::new();
        let ghost = ArtifactKey::named("file:///never-written");
        let target = ghost.clone();
        let handle = store
            .write(
                "derived",
                "text",
                "text",
                vec![],
                Some(mapping_factory(move |_| Ok(vec![Mapping::new((0, 0), (0, 0), target)].into()))),
            )
            .unwrap();

        let result = handle.mappings();
        assert!(matches!(
            result,
            Err(StoreError::DanglingMappingReference { missing, .. }) if missing == ghost
        ));
    }

    #[test]
    fn factory_may_reference_its_own_fresh_key() {
        let store = DataStore::new();
        let handle = store
            .write(
                "self",
                "ab",
                "text",
                vec![],
                Some(mapping_factory(|own| Ok(vec![Mapping::new((0, 1), (0, 0), own.clone())].into()))),
            )
            .unwrap();
        assert_eq!(handle.mappings().unwrap().len(), 1);
    }

    #[test]
    fn lookup_by_text_and_hash() {
        let store = DataStore::new();
        let a = store.write("a", "same", "text", vec![], None).unwrap();
        let b = store.write("b", "same", "text", vec![], None).unwrap();
        store.write("c", "different", "text", vec![], None).unwrap();

        assert_eq!(store.get_by_text(&a.key_text()).unwrap(), a);
        let matches = store.find_by_hash(&ContentHash::of_text("same"));
        assert_eq!(matches, vec![a.key().clone(), b.key().clone()]);
    }

    #[test]
    fn is_structured_and_strict_read() {
        let store = DataStore::new();
        let good = store.write("g", "a: 1", "text", vec![], None).unwrap();
        let bad = store.write("b", "a: [", "text", vec![], None).unwrap();

        assert!(good.is_structured());
        assert_eq!(good.structure().unwrap()["a"], 1);
        assert!(!bad.is_structured());
        assert!(matches!(bad.structure(), Err(StoreError::Parse(_))));
    }

    #[test]
    fn keys_in_insertion_order() {
        let store = DataStore::with_config(StoreConfig::new().with_scheme_root("scratch://"));
        let a = store.write("a", "", "text", vec![], None).unwrap();
        let b = store.write_explicit("file:///b", "", "text", vec![]).unwrap();
        assert_eq!(store.keys(), vec![a.key().clone(), b.key().clone()]);
        assert_eq!(a.key_text(), "scratch://0/a");
    }
}
