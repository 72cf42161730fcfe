//! Colfam Test Utilities
//!
//! An in-memory cluster that speaks enough CQL to run schema
//! synchronization and mutations end to end, without a live database.
//!
//! # Modules
//!
//! - `cql`: Parser for the statements this workspace emits
//! - `catalog`: Option storage in the catalog's text form
//! - `cluster`: [`MemoryCluster`], a [`colfam_db::Session`] implementation
//!
//! # Usage
//!
//! ```rust,ignore
//! use colfam_db::synchronize;
//! use colfam_test_utils::MemoryCluster;
//!
//! #[test]
//! fn test_sync_is_idempotent() {
//!     let cluster = MemoryCluster::new().with_keyspace("cqlengine_test");
//!     synchronize(&cluster, &table).unwrap();
//!     cluster.clear_log();
//!
//!     synchronize(&cluster, &table).unwrap();
//!     assert_eq!(cluster.execute_count(), 0);
//! }
//! ```

pub mod catalog;
mod cluster;
pub mod cql;

// Re-exports for convenience
pub use cluster::MemoryCluster;
