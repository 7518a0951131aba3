//! Lineage Artifact Model
//!
//! Write-once artifact records and the positional mapping model that ties
//! each derived artifact back to the artifacts it was produced from.
//!
//! # Core Concepts
//!
//! - [`ArtifactKey`]: store-scoped identifier (counter-allocated or named)
//! - [`ArtifactRecord`]: immutable content + tag + identity + lazy views
//! - [`MappingTable`]: generated → original position correspondences
//! - [`LineMappingIndex`]: per-line bucketing used to resolve one hop
//! - [`LineIndex`]: byte offset ↔ line/column conversion
//! - [`StructureParser`]: structural parsing collaborator
//!
//! # Example
//!
//! ```rust,ignore
//! use lineage_artifact::{ArtifactKey, LineMappingIndex, Mapping, MappingTable};
//!
//! let source = ArtifactKey::named("file:///spec.yaml");
//! let table: MappingTable = vec![Mapping::new((0, 5), (0, 0), source)].into();
//! let index = LineMappingIndex::build(&table);
//!
//! // column 7 is two bytes past the mapping at column 5
//! let hop = index.resolve_at_line(0, 7);
//! assert_eq!(hop[0].position.column, 2);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod artifact;
mod hash;
mod key;
mod line_index;
mod mapping;
pub mod structure;

pub use artifact::{mapping_factory, ArtifactRecord, MappingFactory};
pub use hash::{ContentHash, HashError};
pub use key::{ArtifactKey, DEFAULT_SCHEME_ROOT};
pub use line_index::LineIndex;
pub use mapping::{
    Correspondence, FlatMapping, FlatMappingTable, LineMappingIndex, Mapping, MappingError,
    MappingTable, Position, ResolvedPosition,
};
pub use structure::{stringify, JsonStructure, ParseError, StructureParser, YamlStructure};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
