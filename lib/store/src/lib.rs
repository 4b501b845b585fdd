//! Persistent store implementations for sigflow.
//!
//! - [`FsDatasetStore`]: one versioned JSON file per dataset
//! - [`SqliteMetadataRepository`]: workflows, nodes and edges in SQLite

pub mod envelope;
pub mod fs;
pub mod sqlite;

pub use envelope::{CURRENT_VERSION, Envelope};
pub use fs::FsDatasetStore;
pub use sqlite::SqliteMetadataRepository;
