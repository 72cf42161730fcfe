//! Mutation statement compiler.
//!
//! Validates column-level intents against a [`colfam_model::TableDescriptor`]
//! and compiles them into parameterized DML: partial updates, full-row
//! inserts, row deletes and key lookups.
//!
//! # Modules
//!
//! - [`intent`]: intents and the `column__op` keyword form
//! - [`predicate`]: key equality predicates
//! - [`write`]: TTL, timestamp and `IF NOT EXISTS` layering
//! - [`capabilities`]: server-version dependent behavior
//! - [`dml`]: compiled statements and their CQL rendering
//! - [`compiler`]: validation and compilation
//! - [`batch`]: `BEGIN BATCH ... APPLY BATCH` over compiled writes

pub mod batch;
pub mod capabilities;
pub mod compiler;
pub mod dml;
pub mod error;
pub mod intent;
pub mod predicate;
pub mod write;

pub use batch::{BatchKind, CompiledBatch};
pub use capabilities::{Capabilities, ServerVersion, VersionParseError};
pub use compiler::{compile_mutation, MutationCompiler};
pub use dml::{Assignment, CompiledStatement, DeleteTarget, DmlStatement};
pub use error::ValidationError;
pub use intent::{MutationIntent, MutationOp};
pub use predicate::Predicate;
pub use write::{Ttl, WriteOptions};
