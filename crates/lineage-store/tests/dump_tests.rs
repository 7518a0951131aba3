//! Dump of a multi-stage pipeline to disk
//!
//! Run with: cargo test --package lineage-store --test dump_tests

use lineage_artifact::{ContentHash, Correspondence};
use lineage_store::{DataStore, FixedSource, Source, StoreConfig, MANIFEST_FILE};
use lineage_test_utils::{init_tracing, write_derived, CountingAccessor};
use pretty_assertions::assert_eq;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

#[tokio::test]
async fn pipeline_dump_writes_content_and_both_tables() -> anyhow::Result<()> {
    init_tracing();
    let store = DataStore::new();
    let accessor = Arc::new(CountingAccessor::new().with_file("file:///in/api.yaml", "title: pets"));
    let inputs = store.read_through(accessor);
    let api = inputs.read_strict("file:///in/api.yaml").await?;

    let stage = write_derived(&store, "model.yaml", "  title: pets", &[((0, 2), (0, 0), &api)]);
    let out = store.sink().write_structured(
        "model.json",
        &serde_json::json!({ "title": "pets" }),
        stage.identity().to_vec(),
        None,
        vec![Correspondence::new((1, 2), (0, 2), stage.key_text()).with_name("title")],
        vec![stage.clone()],
    )?;

    let dir = tempfile::tempdir()?;
    let view = FixedSource::new(vec![api.clone(), stage.clone(), out.clone()]);
    let written = store.dump(&view, dir.path()).await?;
    assert_eq!(written, 3);

    // read-through input lands under its scheme folder
    let input_path = dir.path().join("file").join("in").join("api.yaml");
    assert_eq!(std::fs::read_to_string(&input_path)?, "title: pets");

    let out_path = dir.path().join("1").join("model.json");
    let own = read_json(&out_path.with_file_name("model.json.map"));
    assert_eq!(own[0]["source"], "mem://0/model.yaml");
    assert_eq!(own[0]["name"], "title");

    let flat = read_json(&out_path.with_file_name("model.json.input.map"));
    assert_eq!(flat[0]["source"], "file:///in/api.yaml");
    assert_eq!(flat[0]["original"]["column"], 0);
    assert_eq!(flat[0]["generated"]["line"], 1);

    let manifest = read_json(&dir.path().join(MANIFEST_FILE));
    assert_eq!(manifest.as_array().map(Vec::len), Some(3));
    assert_eq!(manifest[0]["key"], "file:///in/api.yaml");
    assert_eq!(manifest[0]["tag"], "input-file");
    assert_eq!(
        manifest[0]["hash"],
        ContentHash::of_text("title: pets").to_string()
    );
    Ok(())
}

#[tokio::test]
async fn compact_dump_is_single_line() -> anyhow::Result<()> {
    let store = DataStore::with_config(StoreConfig::new().with_pretty_dump(false));
    let a = store.sink().write_text("a", "x", "text", vec![])?;
    let b = write_derived(&store, "b", "x", &[((0, 0), (0, 0), &a)]);

    let dir = tempfile::tempdir()?;
    store.dump(&FixedSource::new(vec![b]), dir.path()).await?;

    let text = std::fs::read_to_string(dir.path().join("1").join("b.map"))?;
    assert!(!text.contains('\n'));
    assert!(text.contains("mem://0/a"));
    Ok(())
}

#[tokio::test]
async fn disabled_view_dumps_nothing() -> anyhow::Result<()> {
    let store = DataStore::new();
    store.sink().write_text("a", "x", "text", vec![])?;

    let dir = tempfile::tempdir()?;
    let written = store.dump(&FixedSource::disabled(), dir.path()).await?;
    assert_eq!(written, 0);
    assert_eq!(read_json(&dir.path().join(MANIFEST_FILE)), serde_json::json!([]));
    Ok(())
}
