//! Schema synchronization and mutation execution.
//!
//! This crate connects the reconciliation engine and the mutation compiler
//! to a live database through the [`Session`] trait. The session is always
//! passed explicitly; nothing here holds a global connection.
//!
//! # Usage
//!
//! ```rust,ignore
//! use colfam_db::{synchronize, Mapper};
//! use colfam_mutation::{MutationIntent, Predicate, WriteOptions};
//!
//! synchronize(&session, &table)?;
//!
//! let mapper = Mapper::new(&session, &table);
//! mapper.update(
//!     &Predicate::new().filter("partition", id).filter("cluster", 1),
//!     &[MutationIntent::merge("text_map", [("bar", None), ("baz", Some("4"))])],
//!     WriteOptions::new(),
//! )?;
//! ```

mod error;
mod keyspace;
mod mapper;
mod session;
mod sync;

pub use error::{DbError, Result};
pub use keyspace::{create_keyspace_network_topology, create_keyspace_simple, drop_keyspace};
pub use mapper::{execute_batch, execute_compiled, Mapper, APPLIED_COLUMN};
pub use session::{fetch_live_table, Session, SessionError};
pub use sync::{drop_model, drop_table, plan_synchronize, synchronize, synchronize_model};
