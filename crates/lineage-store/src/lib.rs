//! Lineage Store
//!
//! In-memory, write-once store for every artifact a generation pipeline
//! produces, and the engine that answers "which original text produced
//! this position" across any number of transformation hops.
//!
//! # Core Operations
//!
//! - **Write**: [`Sink`] creates artifacts under fresh keys, optionally with a
//!   lazily built mapping table
//! - **Read**: [`Source`] views enumerate and read keys; the
//!   [`ReadThroughSource`] materializes external resources exactly once
//! - **Blame**: [`DataStore::blame`] walks mapping tables back to origin
//! - **Dump**: [`DataStore::dump`] writes content and both mapping tables
//!   of a view to disk
//!
//! # Architecture
//!
//! ```text
//! ResourceAccessor → ReadThroughSource ─┐
//!                                       ▼
//!          Stage ── Sink ──────────► DataStore ──► ArtifactHandle
//!            ▲                          │              │ lazy views
//!            └──── FixedSource ◄────────┘              ▼
//!                                      blame / flatten / dump
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use lineage_store::prelude::*;
//!
//! let store = DataStore::new();
//! let sink = store.sink();
//!
//! let original = sink.write_text("greeting.txt", "hello", "text", vec![])?;
//! let source = original.key().clone();
//! let derived = sink.write_mapped("shout.txt", "  HELLO", "text", vec![], move |_| {
//!     Ok(vec![Mapping::new((0, 2), (0, 0), source)].into())
//! })?;
//!
//! let leaves = store.blame_leaves(derived.key(), Position::new(0, 4))?;
//! assert_eq!(leaves[0].position, Position::new(0, 2));
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod blame;
pub mod cancel;
pub mod config;
pub mod dump;
pub mod error;
pub mod read_through;
pub mod resource;
pub mod sink;
pub mod source;
pub mod store;

pub use blame::{compile, BlameNode, BlameTree};
pub use cancel::CancellationFlag;
pub use config::{StoreConfig, DEFAULT_INPUT_TAG, DEFAULT_THIS_FOLDER_TOKEN};
pub use dump::{DumpEntry, MANIFEST_FILE};
pub use error::{StoreError, StoreResult};
pub use read_through::{parent_location, ReadThroughSource};
pub use resource::{FileSystemAccessor, ResourceAccessor};
pub use sink::{Sink, STRUCTURED_TAG};
pub use source::{FixedSource, Source};
pub use store::{ArtifactHandle, DataStore};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for pipeline stages
    pub use crate::blame::{BlameNode, BlameTree};
    pub use crate::error::{StoreError, StoreResult};
    pub use crate::resource::{FileSystemAccessor, ResourceAccessor};
    pub use crate::sink::Sink;
    pub use crate::source::{FixedSource, Source};
    pub use crate::store::{ArtifactHandle, DataStore};
    pub use lineage_artifact::{ArtifactKey, Correspondence, Mapping, MappingTable, Position};
}

#[cfg(test)]
mod integration_tests {
    use super::prelude::*;

    #[test]
    fn prelude_covers_a_stage() {
        let store = DataStore::new();
        let sink = store.sink();

        let original = sink.write_text("greeting.txt", "hello", "text", vec![]).unwrap();
        let source = original.key().clone();
        let derived = sink
            .write_mapped("shout.txt", "  HELLO", "text", vec![], move |_| {
                Ok(vec![Mapping::new((0, 2), (0, 0), source)].into())
            })
            .unwrap();

        let leaves = store.blame_leaves(derived.key(), Position::new(0, 4)).unwrap();
        assert_eq!(leaves[0].position, Position::new(0, 2));
        assert_eq!(leaves[0].key, *original.key());
    }
}
