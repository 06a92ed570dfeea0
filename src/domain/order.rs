//! Canonical order data model
//!
//! `RawRow` is the untyped, per-line output of an extraction source
//! (rendered table cells or a remote order query). `OrderLine` is the
//! canonical record the CSV export consumes. Mapping between the two lives
//! in `infrastructure::parsing::order_mapper`.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Logical columns an extraction source can provide.
///
/// Sources fill whichever subset their layout exposes; the mapper treats
/// absent columns as empty strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Column {
    /// External article/handling number (digits-only identifier).
    ArticleHan,
    /// Supplier SKU, when the layout exposes it directly.
    ArticleNumber,
    /// Free-text article description.
    Description,
    /// Observed quantity, before any pack-size adjustment.
    Quantity,
    /// Net total of the whole line ("Gesamt").
    TotalNetPrice,
    /// Promised or confirmed delivery date.
    DeliveryDate,
    /// Free-text comment carrying the `D-BE… [VPE=n] <article>` grammar.
    Comment,
    /// Requested dispatch date ("Angefragt").
    RequestedDate,
    /// Actual dispatch date ("Versendet").
    ShippedDate,
    /// Parcel tracking reference.
    Tracking,
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::ArticleHan => "article_han",
            Self::ArticleNumber => "article_number",
            Self::Description => "description",
            Self::Quantity => "quantity",
            Self::TotalNetPrice => "total_net_price",
            Self::DeliveryDate => "delivery_date",
            Self::Comment => "comment",
            Self::RequestedDate => "requested_date",
            Self::ShippedDate => "shipped_date",
            Self::Tracking => "tracking",
        };
        write!(f, "{label}")
    }
}

/// Structured article reference, available when the source is the remote
/// order query rather than scraped cell text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleRef {
    /// Supplier SKU.
    pub number: String,
    /// External article/handling number.
    pub han: String,
}

/// One untyped line item as produced by an extraction source.
///
/// Ephemeral: rows are mapped to [`OrderLine`] and discarded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    columns: HashMap<Column, String>,
    article: Option<ArticleRef>,
    quantity: Option<f64>,
    line_total: Option<f64>,
}

impl RawRow {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the text for a logical column, replacing any previous value.
    pub fn set(&mut self, column: Column, value: impl Into<String>) {
        self.columns.insert(column, value.into());
    }

    /// Builder-style variant of [`RawRow::set`], used heavily in tests.
    #[must_use]
    pub fn with(mut self, column: Column, value: impl Into<String>) -> Self {
        self.set(column, value);
        self
    }

    /// Attaches a structured article reference (remote query sources only).
    pub fn set_article(&mut self, article: ArticleRef) {
        self.article = Some(article);
    }

    #[must_use]
    pub fn with_article(mut self, article: ArticleRef) -> Self {
        self.set_article(article);
        self
    }

    /// Sets the already-numeric quantity (remote query sources only).
    pub fn set_quantity(&mut self, quantity: f64) {
        self.quantity = Some(quantity);
    }

    #[must_use]
    pub fn with_quantity(mut self, quantity: f64) -> Self {
        self.set_quantity(quantity);
        self
    }

    /// Sets the already-numeric net line total (remote query sources only).
    pub fn set_line_total(&mut self, total: f64) {
        self.line_total = Some(total);
    }

    #[must_use]
    pub fn with_line_total(mut self, total: f64) -> Self {
        self.set_line_total(total);
        self
    }

    /// Returns the text of a column, or `""` when the source did not
    /// provide it. Callers never distinguish "absent" from "empty".
    #[must_use]
    pub fn get(&self, column: Column) -> &str {
        self.columns.get(&column).map_or("", String::as_str)
    }

    /// Structured article data, when the source had any.
    #[must_use]
    pub fn article(&self) -> Option<&ArticleRef> {
        self.article.as_ref()
    }

    /// Numeric quantity, when the source provided it already typed.
    #[must_use]
    pub fn quantity(&self) -> Option<f64> {
        self.quantity
    }

    /// Numeric net line total, when the source provided it already typed.
    #[must_use]
    pub fn line_total(&self) -> Option<f64> {
        self.line_total
    }

    /// True when the source produced no usable cell at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.article.is_none()
            && self.quantity.is_none()
            && self.line_total.is_none()
            && self.columns.values().all(|v| v.trim().is_empty())
    }
}

/// Canonical, fully normalized order line ready for CSV serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    /// Digits-only external article id (`HAN`).
    pub article_han: String,
    /// Derived internal order number, at most 14 characters.
    pub internal_order_number: String,
    /// Supplier SKU (`Artikelnummer`).
    pub article_number: String,
    /// Article description (`Lieferantenbezeichnung`).
    pub description: String,
    /// Pack-size-adjusted quantity, always >= 1.
    pub quantity: u32,
    /// Discount-adjusted net price per unit, rounded to 4 fraction digits.
    pub net_unit_price: f64,
    /// Normalized delivery date (`DD.MM.YYYY`), or `""` when unknown.
    pub delivery_date: String,
    /// Downstream-system flag, always `"N"`.
    pub free_position: String,
    /// Customer-facing order number of the surrounding order.
    pub external_order_number: String,
}

/// Discounted totals over a batch of mapped lines, mirroring the footer
/// annotation of the shopping-cart page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CartTotals {
    /// Sum of all line totals before the discount.
    pub total_net: f64,
    /// The same sum with the early-payment discount applied.
    pub total_net_discounted: f64,
}
