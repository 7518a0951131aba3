//! Blame engine
//!
//! Walks positional mappings backward from a generated position to the
//! original position(s) that produced it.
//!
//! # Algorithm
//!
//! ```text
//! blame(C, p)
//!   └─ resolve p through C's per-line index   (one hop, may fan out)
//!        ├─ blame(B, p')                       (recurse per result)
//!        │    └─ resolve p' through B ...
//!        │         └─ (A, p'')                  leaf: A has no own mappings
//!        └─ ...
//! ```
//!
//! Resolution is synchronous: every artifact a table references already
//! exists once the table has been validated. A per-path visited set stops
//! recursion when a chain of tables leads back to an artifact already being
//! resolved; the repeated artifact is recorded as a leaf.

use crate::error::StoreResult;
use crate::store::{ArtifactHandle, DataStore};
use lineage_artifact::{
    ArtifactKey, ArtifactRecord, Correspondence, FlatMapping, FlatMappingTable, Mapping,
    MappingError, MappingTable, Position,
};
use serde::Serialize;
use std::sync::Arc;

/// One position in a blame tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlameNode {
    /// Artifact containing the position
    pub key: ArtifactKey,
    /// Position inside `key`'s content
    pub position: Position,
    /// Name carried by the mapping that led here
    pub name: Option<String>,
}

/// Recursive blame result
///
/// Children are one hop closer to origin. A node without children is
/// terminal; several children mean several original locations produced the
/// same generated text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlameTree {
    /// Position this subtree resolves
    pub node: BlameNode,
    /// One subtree per matching mapping entry, in table order
    pub children: Vec<BlameTree>,
}

impl BlameTree {
    fn leaf(key: ArtifactKey, position: Position, name: Option<String>) -> Self {
        Self {
            node: BlameNode {
                key,
                position,
                name,
            },
            children: Vec::new(),
        }
    }

    /// Check if this node is terminal
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.children.is_empty()
    }

    /// Terminal nodes, depth-first, children left to right
    #[must_use]
    pub fn leaves(&self) -> Vec<&BlameNode> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(tree) = stack.pop() {
            if tree.is_terminal() {
                out.push(&tree.node);
            } else {
                stack.extend(tree.children.iter().rev());
            }
        }
        out
    }

    /// Number of hops along the longest path (a lone root has depth 0)
    #[must_use]
    pub fn depth(&self) -> usize {
        self.children
            .iter()
            .map(|child| child.depth() + 1)
            .max()
            .unwrap_or(0)
    }

    /// Total number of nodes
    #[must_use]
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(BlameTree::node_count).sum::<usize>()
    }
}

impl DataStore {
    /// Resolve a generated position to the tree of positions that produced it
    ///
    /// # Errors
    /// - `StoreError::NotFound` if `key` is absent
    /// - `StoreError::DanglingMappingReference` if a table on the way names a
    ///   missing artifact
    pub fn blame(&self, key: &ArtifactKey, position: Position) -> StoreResult<BlameTree> {
        let handle = self.read_sync(key)?;
        Ok(self.blame_tree(handle.key(), position)?)
    }

    /// Terminal original positions for a generated position
    ///
    /// # Errors
    /// Same as [`DataStore::blame`]
    pub fn blame_leaves(&self, key: &ArtifactKey, position: Position) -> StoreResult<Vec<BlameNode>> {
        let tree = self.blame(key, position)?;
        Ok(tree.leaves().into_iter().cloned().collect())
    }

    /// Build an own mapping table from explicit correspondences
    ///
    /// Each correspondence names its source by key text or description; only
    /// `sources` are eligible.
    ///
    /// # Errors
    /// - `StoreError::UnknownMappingSource` if a name matches none of `sources`
    pub fn compile(
        &self,
        artifact: &ArtifactKey,
        mappings: &[Correspondence],
        sources: &[ArtifactHandle],
    ) -> StoreResult<MappingTable> {
        let keys: Vec<ArtifactKey> = sources.iter().map(|h| h.key().clone()).collect();
        Ok(compile(artifact, mappings, &keys, &self.config().scheme_root)?)
    }

    pub(crate) fn blame_tree(
        &self,
        key: &ArtifactKey,
        position: Position,
    ) -> Result<BlameTree, MappingError> {
        let mut path = Vec::new();
        self.blame_hop(key, key.clone(), position, None, &mut path)
    }

    /// Compute the flattened table of one record
    pub(crate) fn flatten_record(
        &self,
        key: &ArtifactKey,
        record: &Arc<ArtifactRecord>,
    ) -> Result<FlatMappingTable, MappingError> {
        let table = record.mappings_with(|artifact, table| self.validate_table(artifact, table))?;

        let mut flat = FlatMappingTable::new();
        for entry in table.iter() {
            let tree = self.blame_tree(key, entry.generated)?;
            for leaf in tree.leaves() {
                flat.push(FlatMapping {
                    generated: entry.generated,
                    original: leaf.position,
                    source: leaf.key.description().to_string(),
                    name: leaf.name.clone(),
                });
            }
        }

        tracing::debug!(
            "Flattened {} own mappings of {} into {} entries",
            table.len(),
            self.render(key),
            flat.len()
        );
        Ok(flat)
    }

    fn blame_hop(
        &self,
        from: &ArtifactKey,
        key: ArtifactKey,
        position: Position,
        name: Option<String>,
        path: &mut Vec<ArtifactKey>,
    ) -> Result<BlameTree, MappingError> {
        let record = self.record_for_hop(from, &key)?;
        let index = record.line_mappings_with(|artifact, table| self.validate_table(artifact, table))?;
        let hops = index.resolve_at_line(position.line, position.column);

        path.push(key.clone());
        let mut children = Vec::with_capacity(hops.len());
        for hop in hops {
            tracing::trace!(
                "Blame hop {}@{} -> {}@{}",
                self.render(&key),
                position,
                self.render(&hop.source),
                hop.position
            );
            if path.contains(&hop.source) {
                tracing::debug!(
                    "Mapping chain revisits {}; recording it as terminal",
                    self.render(&hop.source)
                );
                children.push(BlameTree::leaf(hop.source, hop.position, hop.name));
                continue;
            }
            children.push(self.blame_hop(&key, hop.source, hop.position, hop.name, path)?);
        }
        path.pop();

        Ok(BlameTree {
            node: BlameNode {
                key,
                position,
                name,
            },
            children,
        })
    }
}

/// Build an own mapping table from explicit correspondences
///
/// `source` names are matched against each key rendered with `scheme_root`,
/// then against each key's description.
///
/// # Errors
/// Returns [`MappingError::UnknownSource`] if a name matches no key
pub fn compile(
    artifact: &ArtifactKey,
    mappings: &[Correspondence],
    sources: &[ArtifactKey],
    scheme_root: &str,
) -> Result<MappingTable, MappingError> {
    mappings
        .iter()
        .map(|c| {
            let source = sources
                .iter()
                .find(|k| k.render(scheme_root) == c.source)
                .or_else(|| sources.iter().find(|k| k.description() == c.source))
                .ok_or_else(|| MappingError::UnknownSource {
                    artifact: artifact.clone(),
                    source_name: c.source.clone(),
                })?;
            Ok(Mapping {
                generated: c.generated,
                original: c.original,
                source: source.clone(),
                name: c.name.clone(),
            })
        })
        .collect()
}
