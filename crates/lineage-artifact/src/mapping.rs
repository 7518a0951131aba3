//! Positional mapping model
//!
//! A [`MappingTable`] binds positions in an artifact's generated content to
//! positions in named original artifacts. [`LineMappingIndex`] buckets a table
//! by generated line and answers "which mapping is in force at this column".

use crate::key::ArtifactKey;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

/// Zero-based line/column position
///
/// Columns count UTF-8 bytes from the start of the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    /// Zero-based line
    pub line: u32,
    /// Zero-based byte column within the line
    pub column: u32,
}

impl Position {
    /// Create new position
    #[inline]
    #[must_use]
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl Display for Position {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

impl From<(u32, u32)> for Position {
    fn from((line, column): (u32, u32)) -> Self {
        Self::new(line, column)
    }
}

/// One generated → original correspondence in an artifact's own table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mapping {
    /// Position in the owning artifact's content
    pub generated: Position,
    /// Position in `source`
    pub original: Position,
    /// Artifact the text came from
    pub source: ArtifactKey,
    /// Optional symbolic name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Mapping {
    /// Create an unnamed mapping
    #[inline]
    #[must_use]
    pub fn new(generated: impl Into<Position>, original: impl Into<Position>, source: ArtifactKey) -> Self {
        Self {
            generated: generated.into(),
            original: original.into(),
            source,
            name: None,
        }
    }

    /// Attach a symbolic name
    #[inline]
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Ordered own mapping table of one artifact
///
/// An empty table means the content is original, not derived.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MappingTable(Vec<Mapping>);

impl MappingTable {
    /// Create empty table
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Append an entry
    #[inline]
    pub fn push(&mut self, mapping: Mapping) {
        self.0.push(mapping);
    }

    /// Entries in insertion order
    #[inline]
    #[must_use]
    pub fn entries(&self) -> &[Mapping] {
        &self.0
    }

    /// Iterate entries in insertion order
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Mapping> {
        self.0.iter()
    }

    /// Number of entries
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if table is empty (artifact is original)
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Distinct source keys, in order of first appearance
    #[must_use]
    pub fn sources(&self) -> Vec<&ArtifactKey> {
        let seen: IndexSet<&ArtifactKey> = self.0.iter().map(|m| &m.source).collect();
        seen.into_iter().collect()
    }
}

impl From<Vec<Mapping>> for MappingTable {
    fn from(entries: Vec<Mapping>) -> Self {
        Self(entries)
    }
}

impl FromIterator<Mapping> for MappingTable {
    fn from_iter<I: IntoIterator<Item = Mapping>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a MappingTable {
    type Item = &'a Mapping;
    type IntoIter = std::slice::Iter<'a, Mapping>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// One entry of a flattened table
///
/// `source` is the friendly description of a terminal artifact; synthetic
/// intermediate keys never appear here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatMapping {
    /// Position in the owning artifact's content
    pub generated: Position,
    /// Position in the terminal source
    pub original: Position,
    /// Friendly description of the terminal source
    pub source: String,
    /// Symbolic name carried by the terminal hop
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Mapping table pointing directly at terminal sources
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlatMappingTable(Vec<FlatMapping>);

impl FlatMappingTable {
    /// Create empty table
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Append an entry
    #[inline]
    pub fn push(&mut self, mapping: FlatMapping) {
        self.0.push(mapping);
    }

    /// Entries in insertion order
    #[inline]
    #[must_use]
    pub fn entries(&self) -> &[FlatMapping] {
        &self.0
    }

    /// Number of entries
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if table is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Result of resolving one generated position through one table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPosition {
    /// Artifact one hop closer to origin
    pub source: ArtifactKey,
    /// Position inside `source`
    pub position: Position,
    /// Name carried by the matching entry
    pub name: Option<String>,
}

/// Own mapping table entries bucketed by generated line
#[derive(Debug, Clone, Default)]
pub struct LineMappingIndex {
    lines: BTreeMap<u32, Vec<Mapping>>,
}

impl LineMappingIndex {
    /// Build index from a table, preserving entry order within each line
    #[must_use]
    pub fn build(table: &MappingTable) -> Self {
        let mut lines: BTreeMap<u32, Vec<Mapping>> = BTreeMap::new();
        for mapping in table {
            lines
                .entry(mapping.generated.line)
                .or_default()
                .push(mapping.clone());
        }
        Self { lines }
    }

    /// Entries on a generated line
    #[inline]
    #[must_use]
    pub fn line(&self, line: u32) -> &[Mapping] {
        match self.lines.get(&line) {
            Some(entries) => entries,
            None => &[],
        }
    }

    /// Number of generated lines carrying at least one entry
    #[inline]
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Resolve a generated position one hop back
    ///
    /// Selects the entries on `line` whose generated column is the greatest
    /// one not past `column` (the mapping in force at that column) and shifts
    /// each original column by the distance from that mapping. Several
    /// entries at the same column all resolve, in table order. An empty
    /// result means the position is unmapped.
    #[must_use]
    pub fn resolve_at_line(&self, line: u32, column: u32) -> SmallVec<[ResolvedPosition; 2]> {
        let entries = self.line(line);

        let Some(in_force) = entries
            .iter()
            .map(|m| m.generated.column)
            .filter(|c| *c <= column)
            .max()
        else {
            return SmallVec::new();
        };

        let delta = column - in_force;
        entries
            .iter()
            .filter(|m| m.generated.column == in_force)
            .map(|m| ResolvedPosition {
                source: m.source.clone(),
                position: Position::new(m.original.line, m.original.column.saturating_add(delta)),
                name: m.name.clone(),
            })
            .collect()
    }
}

/// Explicit provenance declaration used when compiling a table
///
/// `source` names a contributing artifact by its key text or description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correspondence {
    /// Position in the artifact being written
    pub generated: Position,
    /// Position in the contributing artifact
    pub original: Position,
    /// Key text or description of the contributing artifact
    pub source: String,
    /// Optional symbolic name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Correspondence {
    /// Create an unnamed correspondence
    #[inline]
    #[must_use]
    pub fn new(generated: impl Into<Position>, original: impl Into<Position>, source: impl Into<String>) -> Self {
        Self {
            generated: generated.into(),
            original: original.into(),
            source: source.into(),
            name: None,
        }
    }

    /// Attach a symbolic name
    #[inline]
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Errors raised while building or consuming a mapping table
///
/// These surface when a table is first consumed, never at write time.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MappingError {
    /// Table names a source key absent from the store
    #[error("mapping table of {artifact} references missing artifact {missing}")]
    DanglingReference {
        artifact: ArtifactKey,
        missing: ArtifactKey,
    },

    /// Correspondence names a source that is not among the contributing artifacts
    #[error("mapping table of {artifact} names unknown source '{source_name}'")]
    UnknownSource {
        artifact: ArtifactKey,
        source_name: String,
    },
}
