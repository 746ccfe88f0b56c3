//! Content-addressed artifact storage for a deployment workspace.
//!
//! # Layout
//!
//! ```text
//! <workspace>/
//! ├── compiled_packages.json   # Index<PackageKey>
//! ├── templates.json           # Index<TemplateKey>
//! └── blobs/
//!     ├── <blob-id>            # exactly the bytes passed to put()
//!     └── <blob-id>.sha256     # recorded content digest
//! ```
//!
//! Blobs are always written before the index entry that references them, and
//! every index rewrite is atomic, so an interrupted deploy can leave orphan
//! blobs but never an entry pointing at a missing blob.

mod blobs;
mod index;
mod types;

pub use blobs::BlobStore;
pub use index::{Index, IndexEntry, RecordOutcome};
pub use types::*;
