//! Declared record types as plain data.
//!
//! A record type is described once, up front, as a [`TableDescriptor`]: an
//! ordered list of [`ColumnDescriptor`]s, a resolved [`TableName`] and
//! [`TableOptions`]. Everything downstream (reconciliation, mutation
//! compilation) works on this value and never on the Rust type itself.
//!
//! # Modules
//!
//! - [`column`]: column descriptors, key roles, index kinds, default policies
//! - [`table`]: table descriptors, naming, the [`Model`] trait
//! - [`options`]: table options and the recognized option set
//! - [`definition`]: serde form used by TOML model files and live snapshots

pub mod column;
pub mod definition;
mod error;
pub mod options;
pub mod table;

pub use column::{
    ClusteringOrder, ColumnDescriptor, DefaultValue, IndexKind, IndexTarget, KeyRole,
};
pub use definition::{ColumnSpec, TableSpec};
pub use error::SchemaError;
pub use options::{option_kind, OptionKind, OptionValue, TableOptions, RECOGNIZED_OPTIONS};
pub use table::{builder_for, table_name_for_type, Model, TableBuilder, TableDescriptor, TableName};
