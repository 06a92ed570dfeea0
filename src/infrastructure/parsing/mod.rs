//! Extraction sources and row normalization
//!
//! Two interchangeable strategies produce [`RawRow`]s: a DOM table reader
//! driven by a versioned selector configuration, and the remote order
//! query. Both feed the record mapper, which owns all normalization rules.

pub mod dom_table;
pub mod normalize;
pub mod order_mapper;
pub mod table_layout;

use crate::domain::RawRow;

pub use dom_table::{DomTableAdapter, DomTableSnapshot};
pub use order_mapper::{map_to_order_line, MappingContext};
pub use table_layout::{CellValue, ColumnBinding, TableLayout};

/// A source of raw, per-line order data.
///
/// Implementations hold an already-acquired snapshot (a parsed HTML
/// document, a fetched query payload); extraction itself is synchronous
/// and infallible per row — a line the source cannot read simply yields
/// fewer or emptier rows, never an error for the whole batch.
pub trait RowSource {
    fn extract_rows(&self) -> Vec<RawRow>;
}

/// Errors raised while building an extraction source from configuration.
///
/// These are configuration mistakes (bad selector strings), not data
/// problems; data problems degrade per cell instead.
#[derive(Debug, thiserror::Error)]
pub enum ParsingError {
    #[error("invalid CSS selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },

    #[error("layout '{0}' defines no column bindings")]
    EmptyLayout(String),
}
