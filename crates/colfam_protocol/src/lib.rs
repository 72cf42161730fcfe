//! Wire-level vocabulary shared by every colfam crate.
//!
//! Column types as the catalog spells them, bound values and result rows,
//! identifier quoting, and the coercion rules that turn loosely typed input
//! into values a column will accept.

pub mod coerce;
pub mod ident;
pub mod statement;
pub mod types;
pub mod value;

pub use coerce::{coerce_value, exact_i64, CoercionError};
pub use ident::{format_identifier, quote_identifier, unquote_identifier};
pub use statement::Statement;
pub use types::{ColumnType, TypeParseError};
pub use value::{ConversionError, FromValue, Row, RowSet, Value};
