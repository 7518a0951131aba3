//! Testing utilities for the lineage workspace
//!
//! Shared fixtures: an in-memory resource accessor that counts fetches, and
//! helpers that build mapping chains in a store.

#![allow(missing_docs)]

use async_trait::async_trait;
use lineage_artifact::{mapping_factory, ArtifactKey, Mapping};
use lineage_store::{ArtifactHandle, DataStore, ResourceAccessor, StoreError, StoreResult};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Once;

/// In-memory accessor that counts fetches
///
/// Yields to the runtime before answering so concurrent readers overlap.
/// Uris ending in `.fail` answer with a fetch error.
#[derive(Debug, Default)]
pub struct CountingAccessor {
    files: Mutex<HashMap<String, String>>,
    fetches: AtomicUsize,
}

impl CountingAccessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resource
    pub fn with_file(self, uri: &str, text: &str) -> Self {
        self.files.lock().insert(uri.to_string(), text.to_string());
        self
    }

    /// Number of fetches answered so far
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResourceAccessor for CountingAccessor {
    async fn fetch(&self, uri: &str) -> StoreResult<Option<String>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        if uri.ends_with(".fail") {
            return Err(StoreError::Fetch {
                uri: uri.to_string(),
                message: "simulated failure".into(),
            });
        }
        Ok(self.files.lock().get(uri).cloned())
    }
}

/// Write original content with no mapping table
pub fn write_original(store: &DataStore, description: &str, content: &str) -> ArtifactHandle {
    store
        .write(description, content, "text", vec![description.to_string()], None)
        .unwrap()
}

/// Write derived content mapped onto `entries`
///
/// Each entry is `(generated, original, source)`; the derived artifact
/// inherits the identity of every source.
pub fn write_derived(
    store: &DataStore,
    description: &str,
    content: &str,
    entries: &[((u32, u32), (u32, u32), &ArtifactHandle)],
) -> ArtifactHandle {
    let mut identity: Vec<String> = Vec::new();
    for (_, _, source) in entries {
        for id in source.identity() {
            if !identity.contains(id) {
                identity.push(id.clone());
            }
        }
    }

    let mappings: Vec<Mapping> = entries
        .iter()
        .map(|(generated, original, source)| Mapping::new(*generated, *original, source.key().clone()))
        .collect();

    store
        .write(
            description,
            content,
            "text",
            identity,
            Some(mapping_factory(move |_| Ok(mappings.into()))),
        )
        .unwrap()
}

/// Key of an artifact that was never written
pub fn ghost_key() -> ArtifactKey {
    ArtifactKey::named("file:///never-written")
}

static TRACING: Once = Once::new();

/// Install a test subscriber honouring `RUST_LOG`; safe to call repeatedly
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_inherits_identity() {
        let store = DataStore::new();
        let a = write_original(&store, "a", "x");
        let b = write_original(&store, "b", "y");
        let c = write_derived(&store, "c", "xy", &[((0, 0), (0, 0), &a), ((0, 1), (0, 0), &b)]);

        assert_eq!(c.identity(), ["a".to_string(), "b".to_string()]);
        assert_eq!(c.mappings().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn counting_accessor_counts() {
        let accessor = CountingAccessor::new().with_file("file:///a", "x");
        assert_eq!(accessor.fetch("file:///a").await.unwrap().as_deref(), Some("x"));
        assert!(accessor.fetch("file:///b").await.unwrap().is_none());
        assert!(accessor.fetch("file:///c.fail").await.is_err());
        assert_eq!(accessor.fetch_count(), 3);
    }
}
