//! DOM table extraction source
//!
//! Reads the currently rendered text of a fixed set of logical columns per
//! row, driven entirely by an injected [`TableLayout`]. Absent optional
//! cells degrade to empty strings; rows may appear, vanish or reorder
//! between extraction passes (the host page re-renders at will), so no
//! state is kept between passes.

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

use super::table_layout::{CellValue, ColumnBinding, TableLayout};
use super::{ParsingError, RowSource};
use crate::domain::RawRow;

/// Compiled form of one [`ColumnBinding`].
struct CompiledBinding {
    binding: ColumnBinding,
    inner: Option<Selector>,
}

/// Extraction adapter for one table layout version.
///
/// Selector compilation happens once at construction; extraction itself
/// never fails, it only yields fewer or emptier rows.
pub struct DomTableAdapter {
    kind: &'static str,
    row_selector: Selector,
    cell_selector: Selector,
    columns: Vec<CompiledBinding>,
}

impl DomTableAdapter {
    /// Compiles a layout description into an adapter.
    ///
    /// # Errors
    /// Returns [`ParsingError::InvalidSelector`] for selector strings the
    /// CSS parser rejects, and [`ParsingError::EmptyLayout`] for a layout
    /// without column bindings.
    pub fn from_layout(layout: &TableLayout) -> Result<Self, ParsingError> {
        let (row_selector, cell_selector, bindings) = layout.parts();
        if bindings.is_empty() {
            return Err(ParsingError::EmptyLayout(layout.kind().to_string()));
        }

        let mut columns = Vec::with_capacity(bindings.len());
        for binding in bindings {
            let inner = binding
                .inner_selector
                .as_deref()
                .map(compile_selector)
                .transpose()?;
            columns.push(CompiledBinding {
                binding: binding.clone(),
                inner,
            });
        }

        Ok(Self {
            kind: layout.kind(),
            row_selector: compile_selector(row_selector)?,
            cell_selector: compile_selector(cell_selector)?,
            columns,
        })
    }

    /// Extracts all rows from a rendered document snapshot.
    #[must_use]
    pub fn extract_rows(&self, html: &Html) -> Vec<RawRow> {
        let mut rows = Vec::new();

        for row_el in html.root_element().select(&self.row_selector) {
            let cells: Vec<ElementRef<'_>> = row_el.select(&self.cell_selector).collect();
            let mut raw = RawRow::new();

            for compiled in &self.columns {
                let value = cells
                    .get(compiled.binding.cell_index)
                    .map(|cell| read_cell(cell, compiled))
                    .unwrap_or_default();
                raw.set(compiled.binding.column, value);
            }

            if raw.is_empty() {
                debug!(layout = self.kind, "skipping empty table row");
                continue;
            }
            rows.push(raw);
        }

        debug!(layout = self.kind, rows = rows.len(), "extracted table rows");
        rows
    }

    /// Binds this adapter to one parsed document, yielding a [`RowSource`].
    #[must_use]
    pub fn snapshot(self: &std::sync::Arc<Self>, html: Html) -> DomTableSnapshot {
        DomTableSnapshot {
            adapter: std::sync::Arc::clone(self),
            html,
        }
    }
}

/// A parsed document paired with the adapter that reads it.
pub struct DomTableSnapshot {
    adapter: std::sync::Arc<DomTableAdapter>,
    html: Html,
}

impl DomTableSnapshot {
    /// Parses an HTML fragment and binds it to the adapter.
    #[must_use]
    pub fn parse(adapter: &std::sync::Arc<DomTableAdapter>, html: &str) -> Self {
        adapter.snapshot(Html::parse_fragment(html))
    }
}

impl RowSource for DomTableSnapshot {
    fn extract_rows(&self) -> Vec<RawRow> {
        self.adapter.extract_rows(&self.html)
    }
}

fn read_cell(cell: &ElementRef<'_>, compiled: &CompiledBinding) -> String {
    let target = match &compiled.inner {
        Some(inner) => match cell.select(inner).next() {
            Some(el) => el,
            None => return String::new(),
        },
        None => *cell,
    };

    match compiled.binding.value_from {
        CellValue::Text => target.text().collect::<String>().trim().to_string(),
        CellValue::InputValue => target
            .value()
            .attr("value")
            .map(|v| v.trim().to_string())
            .unwrap_or_default(),
    }
}

fn compile_selector(selector: &str) -> Result<Selector, ParsingError> {
    Selector::parse(selector).map_err(|e| {
        warn!(selector, "failed to compile selector");
        ParsingError::InvalidSelector {
            selector: selector.to_string(),
            message: e.to_string(),
        }
    })
}
