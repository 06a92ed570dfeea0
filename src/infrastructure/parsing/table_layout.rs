//! Versioned table layout configuration
//!
//! The portal has shipped several incompatible markups for the same
//! logical table: a classic `<table>` in the old Weborder cart, a
//! React-rendered `div[role="table"]` grid in the current checkout, and
//! the orders-detail modal. Each layout is described as data (which
//! selector yields which logical column) instead of being hard-coded in
//! the extraction control flow, so a page redesign is a new configuration
//! entry, not a code change.

use serde::{Deserialize, Serialize};

use crate::domain::Column;

/// Where a cell's value is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CellValue {
    /// Concatenated text content of the (inner) element.
    Text,
    /// The `value` attribute of an `<input>` element.
    InputValue,
}

/// Binds one logical column to a position inside a row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnBinding {
    /// Logical column this binding fills.
    pub column: Column,
    /// Zero-based index of the cell within the row.
    pub cell_index: usize,
    /// Optional selector applied inside the cell to reach the value
    /// element. `None` reads the cell itself.
    pub inner_selector: Option<String>,
    /// How the value is extracted from the resolved element.
    pub value_from: CellValue,
}

impl ColumnBinding {
    fn text(column: Column, cell_index: usize, inner: &str) -> Self {
        Self {
            column,
            cell_index,
            inner_selector: (!inner.is_empty()).then(|| inner.to_string()),
            value_from: CellValue::Text,
        }
    }

    fn input(column: Column, cell_index: usize, inner: &str) -> Self {
        Self {
            column,
            cell_index,
            inner_selector: (!inner.is_empty()).then(|| inner.to_string()),
            value_from: CellValue::InputValue,
        }
    }
}

/// Structural description of one table markup version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum TableLayout {
    /// Classic `<table>` markup (old Weborder shopping carts).
    LegacyTable {
        row_selector: String,
        cell_selector: String,
        columns: Vec<ColumnBinding>,
    },
    /// ARIA-role based grid markup (current checkout and orders modal).
    ReactGrid {
        row_selector: String,
        cell_selector: String,
        columns: Vec<ColumnBinding>,
    },
}

impl TableLayout {
    /// Name used in logs and errors.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::LegacyTable { .. } => "legacy-table",
            Self::ReactGrid { .. } => "react-grid",
        }
    }

    pub(crate) fn parts(&self) -> (&str, &str, &[ColumnBinding]) {
        match self {
            Self::LegacyTable {
                row_selector,
                cell_selector,
                columns,
            }
            | Self::ReactGrid {
                row_selector,
                cell_selector,
                columns,
            } => (row_selector, cell_selector, columns),
        }
    }

    /// Checkout cart grid of the current portal.
    #[must_use]
    pub fn portal_checkout_grid() -> Self {
        Self::ReactGrid {
            row_selector: r#"div[role="row"].b2b-n-.b2b-e0"#.into(),
            cell_selector: r#"div[role="cell"]"#.into(),
            columns: vec![
                ColumnBinding::text(Column::ArticleHan, 1, "div.b2b-hf.b2b-hg a"),
                ColumnBinding::text(Column::Description, 2, "span"),
                ColumnBinding::text(Column::TotalNetPrice, 3, "span"),
                ColumnBinding::input(Column::Quantity, 5, "input"),
                ColumnBinding::text(
                    Column::DeliveryDate,
                    7,
                    "span.b2b-r_ div.b2b-gg.b2b-sa span.body_xxs_default.b2b-gi",
                ),
                ColumnBinding::input(Column::Comment, 8, "input"),
            ],
        }
    }

    /// Order-details modal of the orders page. The modal is rendered by
    /// the React portal but its body is a genuine `<table>`.
    #[must_use]
    pub fn orders_modal_table() -> Self {
        Self::LegacyTable {
            row_selector: "table.b2b-pa tbody tr".into(),
            cell_selector: "td".into(),
            columns: vec![
                ColumnBinding::text(Column::ArticleNumber, 0, "div.ui-kz.ui-cq.ui-k-"),
                ColumnBinding::text(Column::Comment, 1, "div"),
                ColumnBinding::text(Column::Description, 2, "div"),
                ColumnBinding::text(Column::RequestedDate, 3, "div"),
                ColumnBinding::text(Column::ShippedDate, 4, "div"),
                ColumnBinding::text(Column::Quantity, 5, "div"),
                ColumnBinding::text(Column::TotalNetPrice, 6, "div"),
                ColumnBinding::text(Column::Tracking, 7, "span"),
            ],
        }
    }

    /// Shopping cart table of the legacy Weborder site.
    #[must_use]
    pub fn weborder_cart_table() -> Self {
        Self::LegacyTable {
            row_selector: "tbody tr".into(),
            cell_selector: "td".into(),
            columns: vec![
                ColumnBinding::input(Column::Quantity, 3, "input"),
                ColumnBinding::text(Column::TotalNetPrice, 9, ""),
                ColumnBinding::text(Column::Description, 2, ""),
                ColumnBinding::text(Column::ArticleHan, 1, ""),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_round_trips_through_serde() {
        let layout = TableLayout::portal_checkout_grid();
        let json = serde_json::to_string(&layout).unwrap();
        assert!(json.contains(r#""kind":"react-grid""#));
        let back: TableLayout = serde_json::from_str(&json).unwrap();
        assert_eq!(back, layout);
    }

    #[test]
    fn builtin_layouts_bind_the_mapper_inputs() {
        for layout in [
            TableLayout::portal_checkout_grid(),
            TableLayout::orders_modal_table(),
        ] {
            let (_, _, columns) = layout.parts();
            assert!(
                columns.iter().any(|b| b.column == Column::Quantity),
                "{} lacks a quantity binding",
                layout.kind()
            );
            assert!(columns.iter().any(|b| b.column == Column::Comment
                || b.column == Column::TotalNetPrice));
        }
    }
}
