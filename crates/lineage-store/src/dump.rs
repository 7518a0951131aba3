//! Debug dump of a view to disk
//!
//! For every key a view enumerates, three files are written side by side
//! under the target directory, at the key's [`dump_path`]:
//!
//! ```text
//! <path>            content
//! <path>.map        own mapping table (sources as key text)
//! <path>.input.map  flattened mapping table
//! ```
//!
//! plus `index.json` at the root when the manifest is enabled.
//!
//! Every output path is claimed once per dump. A key whose files would land
//! on an already claimed path (another key's files or the manifest) fails
//! the dump before anything of it is written.
//!
//! [`dump_path`]: lineage_artifact::ArtifactKey::dump_path

use crate::error::{StoreError, StoreResult};
use crate::source::Source;
use crate::store::{ArtifactHandle, DataStore};
use lineage_artifact::{ContentHash, Correspondence};
use serde::Serialize;
use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Manifest file name written at the dump root
pub const MANIFEST_FILE: &str = "index.json";

/// One manifest entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DumpEntry {
    /// Rendered key
    pub key: String,
    /// Content path relative to the dump root
    pub path: PathBuf,
    /// Kind tag
    pub tag: String,
    /// Absolute origins
    pub identity: Vec<String>,
    /// Blake3 hash of the content
    pub hash: ContentHash,
}

impl DataStore {
    /// Write every key of `source` under `target`
    ///
    /// Returns the number of keys written. Keys the view enumerates but
    /// cannot read are skipped.
    ///
    /// # Errors
    /// - `StoreError::Io` if a file or directory cannot be written
    /// - `StoreError::DumpPathCollision` if two keys map onto one output path
    /// - `StoreError::DanglingMappingReference` if a mapping table is invalid
    /// - Any read error of `source`
    pub async fn dump(&self, source: &dyn Source, target: &Path) -> StoreResult<usize> {
        let mut manifest = Vec::new();
        let mut claimed = HashSet::new();
        let mut dumped = HashSet::new();
        if self.config().write_dump_manifest {
            claimed.insert(PathBuf::from(MANIFEST_FILE));
        }

        for key in source.enumerate().await {
            let Some(handle) = source.read(&key).await? else {
                tracing::debug!("Dump skipping unreadable key {}", key);
                continue;
            };
            if !dumped.insert(handle.key().clone()) {
                continue;
            }
            manifest.push(self.dump_one(&handle, target, &mut claimed).await?);
        }

        if self.config().write_dump_manifest {
            let path = target.join(MANIFEST_FILE);
            write_file(&path, self.encode(&manifest)?).await?;
        }

        tracing::info!("Dumped {} artifacts to {}", manifest.len(), target.display());
        Ok(manifest.len())
    }

    async fn dump_one(
        &self,
        handle: &ArtifactHandle,
        target: &Path,
        claimed: &mut HashSet<PathBuf>,
    ) -> StoreResult<DumpEntry> {
        let relative = handle.key().dump_path();
        let files = [
            relative.clone(),
            with_suffix(&relative, ".map"),
            with_suffix(&relative, ".input.map"),
        ];
        if let Some(taken) = files.iter().find(|file| claimed.contains(*file)) {
            tracing::warn!("Dump of {} collides at {}", handle.key_text(), taken.display());
            return Err(StoreError::DumpPathCollision {
                key: handle.key_text(),
                path: taken.clone(),
            });
        }
        claimed.extend(files);
        let path = target.join(&relative);

        let own: Vec<Correspondence> = handle
            .mappings()?
            .iter()
            .map(|m| Correspondence {
                generated: m.generated,
                original: m.original,
                source: self.render(&m.source),
                name: m.name.clone(),
            })
            .collect();
        let flat = handle.input_mappings()?;

        write_file(&path, handle.content().to_string()).await?;
        write_file(&with_suffix(&path, ".map"), self.encode(&own)?).await?;
        write_file(&with_suffix(&path, ".input.map"), self.encode(flat.entries())?).await?;

        Ok(DumpEntry {
            key: handle.key_text(),
            path: relative,
            tag: handle.tag().to_string(),
            identity: handle.identity().to_vec(),
            hash: handle.content_hash(),
        })
    }

    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> StoreResult<String> {
        let text = if self.config().pretty_dump {
            serde_json::to_string_pretty(value)?
        } else {
            serde_json::to_string(value)?
        };
        Ok(text)
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

async fn write_file(path: &Path, contents: String) -> StoreResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| StoreError::io_error(parent, e))?;
    }
    tokio::fs::write(path, contents)
        .await
        .map_err(|e| StoreError::io_error(path, e))
}
