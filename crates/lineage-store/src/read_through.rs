//! Read-through view over external resources
//!
//! On a store miss the view fetches the resource, substitutes the
//! this-folder token with the resource's parent location and writes the
//! text into the store under the uri itself. Concurrent reads of one uri
//! share a single in-flight fetch through the moka cache, so each resource
//! is fetched and written at most once per view.

use crate::error::{StoreError, StoreResult};
use crate::resource::ResourceAccessor;
use crate::source::Source;
use crate::store::{ArtifactHandle, DataStore};
use async_trait::async_trait;
use indexmap::IndexSet;
use lineage_artifact::ArtifactKey;
use moka::future::Cache;
use parking_lot::Mutex;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

/// Caching view that materializes external resources into the store
pub struct ReadThroughSource {
    store: DataStore,
    accessor: Arc<dyn ResourceAccessor>,
    // Absent resources are kept as `None`; failed fetches are not kept
    cache: Cache<String, Option<ArtifactHandle>>,
    resolved: Mutex<IndexSet<String>>,
}

impl ReadThroughSource {
    /// Create view over store and accessor
    #[must_use]
    pub fn new(store: DataStore, accessor: Arc<dyn ResourceAccessor>) -> Self {
        Self {
            store,
            accessor,
            cache: Cache::builder().build(),
            resolved: Mutex::new(IndexSet::new()),
        }
    }

    /// Store backing this view
    #[inline]
    #[must_use]
    pub fn store(&self) -> &DataStore {
        &self.store
    }

    /// Number of uris resolved so far
    #[inline]
    #[must_use]
    pub fn resolved_count(&self) -> usize {
        self.resolved.lock().len()
    }

    fn note_resolved(&self, uri: &str) {
        let mut resolved = self.resolved.lock();
        if !resolved.contains(uri) {
            resolved.insert(uri.to_string());
        }
    }

    async fn materialize(&self, uri: &str) -> StoreResult<Option<ArtifactHandle>> {
        tracing::debug!("Read-through miss for {}; fetching", uri);
        let Some(text) = self.accessor.fetch(uri).await? else {
            tracing::debug!("No resource at {}", uri);
            return Ok(None);
        };

        let config = self.store.config();
        let text = if config.this_folder_token.is_empty() {
            text
        } else {
            text.replace(&config.this_folder_token, parent_location(uri))
        };

        let key = ArtifactKey::named(uri);
        match self
            .store
            .write_explicit(key.clone(), text, &config.input_tag, vec![uri.to_string()])
        {
            Ok(handle) => Ok(Some(handle)),
            // Written by someone else since the lookup; theirs stands
            Err(StoreError::WriteConflict(_)) => Ok(self.store.get(&key)),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl Source for ReadThroughSource {
    async fn enumerate(&self) -> Vec<String> {
        self.resolved.lock().iter().cloned().collect()
    }

    async fn read(&self, uri: &str) -> StoreResult<Option<ArtifactHandle>> {
        let stored = self
            .store
            .get(&ArtifactKey::named(uri))
            .or_else(|| self.store.get_by_text(uri));
        if let Some(handle) = stored {
            tracing::trace!("Read-through hit for {}", uri);
            self.note_resolved(uri);
            return Ok(Some(handle));
        }

        let handle = self
            .cache
            .try_get_with(uri.to_string(), self.materialize(uri))
            .await
            .map_err(|shared| unshare_error(uri, shared))?;

        if handle.is_some() {
            self.note_resolved(uri);
        }
        Ok(handle)
    }
}

impl Debug for ReadThroughSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadThroughSource")
            .field("accessor", &self.accessor)
            .field("resolved", &self.resolved_count())
            .finish_non_exhaustive()
    }
}

impl DataStore {
    /// Read-through view fetching misses through `accessor`
    #[inline]
    #[must_use]
    pub fn read_through(&self, accessor: Arc<dyn ResourceAccessor>) -> ReadThroughSource {
        ReadThroughSource::new(self.clone(), accessor)
    }
}

/// Parent location of a uri: everything before the last `/`
///
/// `file:///specs/api.yaml` yields `file:///specs`. A uri without a `/`
/// lives in the current folder, `.`.
#[must_use]
pub fn parent_location(uri: &str) -> &str {
    match uri.rsplit_once('/') {
        Some((parent, _)) => parent,
        None => ".",
    }
}

// Waiters on a shared failed fetch receive the error behind an Arc
fn unshare_error(uri: &str, shared: Arc<StoreError>) -> StoreError {
    Arc::try_unwrap(shared).unwrap_or_else(|shared| match &*shared {
        StoreError::Cancelled => StoreError::Cancelled,
        other => StoreError::Fetch {
            uri: uri.to_string(),
            message: other.to_string(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex as SyncMutex;
    use std::collections::HashMap;

    #[derive(Debug, Default)]
    struct MapAccessor {
        files: HashMap<String, String>,
        calls: SyncMutex<Vec<String>>,
    }

    impl MapAccessor {
        fn with(mut self, uri: &str, text: &str) -> Self {
            self.files.insert(uri.to_string(), text.to_string());
            self
        }
    }

    #[async_trait]
    impl ResourceAccessor for MapAccessor {
        async fn fetch(&self, uri: &str) -> StoreResult<Option<String>> {
            self.calls.lock().push(uri.to_string());
            if uri.ends_with(".broken") {
                return Err(StoreError::Fetch {
                    uri: uri.to_string(),
                    message: "unreadable".into(),
                });
            }
            Ok(self.files.get(uri).cloned())
        }
    }

    #[test]
    fn parent_location_drops_last_segment() {
        assert_eq!(parent_location("file:///specs/api.yaml"), "file:///specs");
        assert_eq!(parent_location("https://host/a/b/c.json"), "https://host/a/b");
        assert_eq!(parent_location("api.yaml"), ".");
    }

    #[tokio::test]
    async fn miss_fetches_substitutes_and_writes() {
        let store = DataStore::new();
        let accessor = Arc::new(
            MapAccessor::default().with("file:///specs/api.yaml", "$ref: $(this-folder)/common.yaml"),
        );
        let view = store.read_through(accessor.clone());

        let handle = view.read("file:///specs/api.yaml").await.unwrap().unwrap();
        assert_eq!(handle.content(), "$ref: file:///specs/common.yaml");
        assert_eq!(handle.tag(), "input-file");
        assert_eq!(handle.identity(), ["file:///specs/api.yaml".to_string()]);
        assert_eq!(handle.key(), &ArtifactKey::named("file:///specs/api.yaml"));

        let again = view.read("file:///specs/api.yaml").await.unwrap().unwrap();
        assert_eq!(again, handle);
        assert_eq!(accessor.calls.lock().len(), 1);
        assert_eq!(view.enumerate().await, vec!["file:///specs/api.yaml"]);
    }

    #[tokio::test]
    async fn existing_store_entry_skips_fetch() {
        let store = DataStore::new();
        store
            .write_explicit("file:///pre.yaml", "a: 1", "input-file", vec![])
            .unwrap();
        let accessor = Arc::new(MapAccessor::default());
        let view = store.read_through(accessor.clone());

        let handle = view.read("file:///pre.yaml").await.unwrap().unwrap();
        assert_eq!(handle.content(), "a: 1");
        assert!(accessor.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn generated_key_text_is_served_from_store() {
        let store = DataStore::new();
        let written = store.sink().write_text("a.yaml", "a: 1", "text", vec![]).unwrap();
        let accessor = Arc::new(MapAccessor::default());
        let view = store.read_through(accessor.clone());

        let handle = view.read(&written.key_text()).await.unwrap().unwrap();
        assert_eq!(handle, written);
        assert!(accessor.calls.lock().is_empty());
        assert_eq!(view.enumerate().await, vec!["mem://0/a.yaml"]);
    }

    #[tokio::test]
    async fn absent_resource_is_cached_as_absent() {
        let store = DataStore::new();
        let accessor = Arc::new(MapAccessor::default());
        let view = store.read_through(accessor.clone());

        assert!(view.read("file:///nope").await.unwrap().is_none());
        assert!(view.read("file:///nope").await.unwrap().is_none());
        assert_eq!(accessor.calls.lock().len(), 1);
        assert!(view.enumerate().await.is_empty());
        assert!(matches!(
            view.read_strict("file:///nope").await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn failed_fetch_is_not_cached() {
        let store = DataStore::new();
        let accessor = Arc::new(MapAccessor::default());
        let view = store.read_through(accessor.clone());

        let first = view.read("file:///x.broken").await;
        assert!(matches!(first, Err(StoreError::Fetch { .. })));
        let second = view.read("file:///x.broken").await;
        assert!(second.unwrap_err().is_retryable());
        assert_eq!(accessor.calls.lock().len(), 2);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn cancelled_store_refuses_materialization() {
        let store = DataStore::new();
        let accessor = Arc::new(MapAccessor::default().with("file:///a", "x"));
        let view = store.read_through(accessor);
        store.cancel();

        assert!(matches!(view.read("file:///a").await, Err(StoreError::Cancelled)));
        assert!(store.is_empty());
    }
}
