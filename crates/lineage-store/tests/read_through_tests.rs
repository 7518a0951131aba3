//! Read-through view: single-flight fetches and placeholder substitution
//!
//! Run with: cargo test --package lineage-store --test read_through_tests

use lineage_artifact::ArtifactKey;
use lineage_store::{DataStore, FileSystemAccessor, Source, StoreConfig, StoreError};
use lineage_test_utils::{init_tracing, CountingAccessor};
use pretty_assertions::assert_eq;
use std::sync::Arc;

#[tokio::test]
async fn concurrent_reads_share_one_fetch() {
    init_tracing();
    let store = DataStore::new();
    let accessor = Arc::new(CountingAccessor::new().with_file("file:///specs/api.yaml", "openapi: 3.0"));
    let view = store.read_through(accessor.clone());

    let (first, second) = futures::join!(
        view.read("file:///specs/api.yaml"),
        view.read("file:///specs/api.yaml")
    );
    let first = first.unwrap().unwrap();
    let second = second.unwrap().unwrap();

    assert_eq!(accessor.fetch_count(), 1);
    assert_eq!(store.len(), 1);
    assert_eq!(first.key(), second.key());
    assert!(first.shares_record_with(&second));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn many_tasks_share_one_fetch() {
    let store = DataStore::new();
    let accessor = Arc::new(CountingAccessor::new().with_file("file:///a.yaml", "a: 1"));
    let view = Arc::new(store.read_through(accessor.clone()));

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let view = Arc::clone(&view);
            tokio::spawn(async move { view.read("file:///a.yaml").await })
        })
        .collect();

    for task in tasks {
        let handle = task.await.unwrap().unwrap().unwrap();
        assert_eq!(handle.key(), &ArtifactKey::named("file:///a.yaml"));
    }
    assert_eq!(accessor.fetch_count(), 1);
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn placeholder_becomes_parent_location() {
    let store = DataStore::new();
    let accessor = Arc::new(
        CountingAccessor::new().with_file("scheme://dir/file.ext", "base: $(this-folder)\nalso: $(this-folder)/x"),
    );
    let view = store.read_through(accessor);

    let handle = view.read("scheme://dir/file.ext").await.unwrap().unwrap();
    assert_eq!(handle.content(), "base: scheme://dir\nalso: scheme://dir/x");
}

#[tokio::test]
async fn custom_token_and_tag_from_config() {
    let config = StoreConfig::from_toml_str(
        r#"
        this_folder_token = "{{here}}"
        input_tag = "source"
        "#,
    )
    .unwrap();
    let store = DataStore::with_config(config);
    let accessor = Arc::new(CountingAccessor::new().with_file("file:///d/f.txt", "{{here}}/g"));
    let view = store.read_through(accessor);

    let handle = view.read("file:///d/f.txt").await.unwrap().unwrap();
    assert_eq!(handle.content(), "file:///d/g");
    assert_eq!(handle.tag(), "source");
}

#[tokio::test]
async fn enumerate_in_first_resolution_order() {
    let store = DataStore::new();
    let accessor = Arc::new(
        CountingAccessor::new()
            .with_file("file:///b", "b")
            .with_file("file:///a", "a"),
    );
    let view = store.read_through(accessor);

    view.read("file:///b").await.unwrap();
    view.read("file:///missing").await.unwrap();
    view.read("file:///a").await.unwrap();
    view.read("file:///b").await.unwrap();

    assert_eq!(view.enumerate().await, vec!["file:///b", "file:///a"]);
    let inputs = view.read_by_tag("input-file").await.unwrap();
    assert_eq!(inputs.len(), 2);
}

#[tokio::test]
async fn fetch_failure_surfaces_and_retries_next_time() {
    let store = DataStore::new();
    let accessor = Arc::new(CountingAccessor::new());
    let view = store.read_through(accessor.clone());

    let err = view.read("file:///x.fail").await.unwrap_err();
    assert!(matches!(err, StoreError::Fetch { .. }));
    assert!(err.is_retryable());
    assert!(view.read("file:///x.fail").await.is_err());
    assert_eq!(accessor.fetch_count(), 2);
}

#[tokio::test]
async fn filesystem_accessor_materializes_local_files() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("spec.yaml"), "root: $(this-folder)").unwrap();

    let store = DataStore::new();
    let view = store.read_through(Arc::new(FileSystemAccessor::with_root(dir.path())));

    let handle = view.read("spec.yaml").await.unwrap().unwrap();
    assert_eq!(handle.content(), "root: .");
    assert!(handle.is_structured());
    assert!(view.read("absent.yaml").await.unwrap().is_none());
}
