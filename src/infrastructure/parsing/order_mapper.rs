//! Raw row to canonical order line mapping
//!
//! Pure normalization: no I/O, no side effects, and no panics for any
//! input row. Missing or malformed fields degrade to empty strings and
//! neutral defaults so one bad line never aborts a batch.
//!
//! The comment field carries a small embedded grammar typed by the
//! purchaser: `D-BE<ref> [VPE=<n>] <article-number>`. Three independent
//! extractions read the same string and each tolerates absence.

use once_cell::sync::Lazy;
use regex::Regex;

use super::normalize::{format_german_date, parse_european_number, safe_regex_extract};
use crate::domain::constants::{
    DISCOUNT_FACTOR, FREE_POSITION, INTERNAL_ORDER_NUMBER_MAX_LEN, INTERNAL_ORDER_NUMBER_SUFFIX,
    PRICE_FRACTION_DIGITS,
};
use crate::domain::{CartTotals, Column, OrderLine, RawRow};

/// Leading `D-BE…` token: the internal order reference.
static INTERNAL_REF: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(D-BE\S*)").unwrap());

/// Optional pack-size marker anywhere after the reference.
static VPE_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"VPE=(\d+)").unwrap());

/// Trailing token after the reference and the optional VPE marker. The
/// group is `\S*`, not `\S+`: a comment ending at the marker has no
/// article number, and the marker itself must never be captured as one.
static COMMENT_ARTICLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*D-BE\S*\s*(?:VPE=\d+\s*)?(\S*)").unwrap());

/// Per-batch context the mapper needs beyond the row itself.
#[derive(Debug, Clone)]
pub struct MappingContext {
    /// Early-payment discount factor applied to line totals.
    pub discount_factor: f64,
    /// Customer-facing order number of the surrounding order
    /// (`Fremdbelegnummer` in the export).
    pub external_order_number: String,
    /// Internal order number from the order header, when the source is
    /// the remote query. Takes priority over the comment grammar.
    pub internal_order_number: Option<String>,
}

impl Default for MappingContext {
    fn default() -> Self {
        Self {
            discount_factor: DISCOUNT_FACTOR,
            external_order_number: String::new(),
            internal_order_number: None,
        }
    }
}

impl MappingContext {
    #[must_use]
    pub fn for_order(external_order_number: impl Into<String>) -> Self {
        Self {
            external_order_number: external_order_number.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_internal_order_number(mut self, number: impl Into<String>) -> Self {
        let number = number.into();
        self.internal_order_number = (!number.is_empty()).then_some(number);
        self
    }
}

/// Maps one raw row to a canonical [`OrderLine`].
///
/// Field priority: structured article data (remote query sources) wins
/// over layout columns, which win over values decoded from the comment
/// grammar. The per-unit price is always derived from the line total
/// after the pack-size adjustment; rounding happens after the division.
#[must_use]
pub fn map_to_order_line(row: &RawRow, ctx: &MappingContext) -> OrderLine {
    let comment = row.get(Column::Comment);

    // Header-provided internal number (remote query) wins over the one
    // decoded from the comment grammar.
    let internal_order_number = match &ctx.internal_order_number {
        Some(number) => truncate_internal(number.clone()),
        None => {
            let internal_ref = safe_regex_extract(comment, &INTERNAL_REF, 1);
            derive_internal_order_number(&internal_ref)
        }
    };

    let multiplier = pack_multiplier(comment);
    let base_quantity = row
        .quantity()
        .unwrap_or_else(|| parse_european_number(row.get(Column::Quantity)));
    let quantity = adjusted_quantity(base_quantity, multiplier);

    let total = match row
        .line_total()
        .unwrap_or_else(|| parse_european_number(row.get(Column::TotalNetPrice)))
    {
        t if t.is_finite() => t,
        _ => 0.0,
    };
    let net_unit_price = round_to(
        total * ctx.discount_factor / f64::from(quantity),
        PRICE_FRACTION_DIGITS,
    );

    let article_number = row
        .article()
        .map(|a| a.number.clone())
        .filter(|n| !n.is_empty())
        .or_else(|| non_empty(row.get(Column::ArticleNumber)))
        .unwrap_or_else(|| safe_regex_extract(comment, &COMMENT_ARTICLE, 1));

    let article_han = row
        .article()
        .map(|a| digits_only(&a.han))
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| digits_only(row.get(Column::ArticleHan)));

    OrderLine {
        article_han,
        internal_order_number,
        article_number,
        description: row.get(Column::Description).to_string(),
        quantity,
        net_unit_price,
        delivery_date: format_german_date(row.get(Column::DeliveryDate)),
        free_position: FREE_POSITION.to_string(),
        external_order_number: ctx.external_order_number.clone(),
    }
}

/// Discounted batch totals, mirroring the cart footer annotation.
#[must_use]
pub fn cart_totals(rows: &[RawRow], discount_factor: f64) -> CartTotals {
    let total_net: f64 = rows
        .iter()
        .map(|row| parse_european_number(row.get(Column::TotalNetPrice)))
        .filter(|t| t.is_finite())
        .sum();
    CartTotals {
        total_net,
        total_net_discounted: round_to(total_net * discount_factor, PRICE_FRACTION_DIGITS),
    }
}

/// `D-BE…` reference -> downstream internal order number: suffix first,
/// then truncation to the downstream fixed-width limit. An absent
/// reference stays empty.
fn derive_internal_order_number(internal_ref: &str) -> String {
    if internal_ref.is_empty() {
        return String::new();
    }
    truncate_internal(format!("{internal_ref}{INTERNAL_ORDER_NUMBER_SUFFIX}"))
}

fn truncate_internal(mut number: String) -> String {
    if number.len() > INTERNAL_ORDER_NUMBER_MAX_LEN {
        number.truncate(INTERNAL_ORDER_NUMBER_MAX_LEN);
    }
    number
}

/// `VPE=<n>` pack multiplier; unparsable, missing, or zero all clamp to 1.
fn pack_multiplier(comment: &str) -> u32 {
    safe_regex_extract(comment, &VPE_MARKER, 1)
        .parse::<u32>()
        .unwrap_or(1)
        .max(1)
}

/// Observed quantity times pack multiplier, clamped to >= 1.
fn adjusted_quantity(base: f64, multiplier: u32) -> u32 {
    if !base.is_finite() || base <= 0.0 {
        return 1;
    }
    let adjusted = (base * f64::from(multiplier)).round();
    if adjusted < 1.0 {
        1
    } else {
        adjusted as u32
    }
}

fn digits_only(text: &str) -> String {
    text.chars().filter(char::is_ascii_digit).collect()
}

fn non_empty(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn round_to(value: f64, fraction_digits: usize) -> f64 {
    let factor = 10f64.powi(fraction_digits as i32);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ArticleRef;
    use rstest::rstest;

    fn checkout_row() -> RawRow {
        RawRow::new()
            .with(Column::ArticleHan, "593 27 56-01")
            .with(Column::Description, "Fadenkopf T25")
            .with(Column::Quantity, "2")
            .with(Column::TotalNetPrice, "51,80")
            .with(Column::DeliveryDate, "5.9.2025")
            .with(Column::Comment, "D-BE12345 VPE=6 ART-99")
    }

    #[test]
    fn decodes_the_full_comment_grammar() {
        let line = map_to_order_line(&checkout_row(), &MappingContext::for_order("4711"));

        assert_eq!(line.internal_order_number, "D-BE12345-I");
        assert_eq!(line.article_number, "ART-99");
        // 2 observed * VPE 6
        assert_eq!(line.quantity, 12);
        assert_eq!(line.external_order_number, "4711");
        assert_eq!(line.free_position, "N");
        assert_eq!(line.delivery_date, "05.09.2025");
        assert_eq!(line.article_han, "593275601");
    }

    #[test]
    fn unit_price_is_derived_after_pack_adjustment() {
        let line = map_to_order_line(&checkout_row(), &MappingContext::default());
        // 51.80 * 0.97 / 12, rounded after the division
        assert!((line.net_unit_price - 4.1872).abs() < 1e-9);
    }

    #[rstest]
    #[case("D-BE12345 ART-99", 1)] // no marker
    #[case("D-BE12345 VPE=0 ART-99", 1)] // zero clamps
    #[case("D-BE12345 VPE=x ART-99", 1)] // non-numeric
    #[case("D-BE12345 VPE=6 ART-99", 6)]
    fn pack_multiplier_never_drops_below_one(#[case] comment: &str, #[case] expected: u32) {
        assert_eq!(pack_multiplier(comment), expected);
    }

    #[rstest]
    #[case("", 1)]
    #[case("0", 1)]
    #[case("-3", 1)]
    #[case("kaputt", 1)]
    #[case("4", 4)]
    fn quantity_is_always_at_least_one(#[case] quantity: &str, #[case] expected: u32) {
        let row = RawRow::new().with(Column::Quantity, quantity);
        let line = map_to_order_line(&row, &MappingContext::default());
        assert_eq!(line.quantity, expected);
    }

    #[test]
    fn internal_order_number_is_truncated_to_fourteen_chars() {
        let row = RawRow::new().with(Column::Comment, "D-BE12345678901234 ART");
        let line = map_to_order_line(&row, &MappingContext::default());
        assert_eq!(line.internal_order_number.len(), 14);
        assert_eq!(line.internal_order_number, "D-BE1234567890");
    }

    #[test]
    fn empty_row_degrades_without_panicking() {
        let line = map_to_order_line(&RawRow::new(), &MappingContext::default());
        assert_eq!(line.internal_order_number, "");
        assert_eq!(line.article_number, "");
        assert_eq!(line.quantity, 1);
        assert!((line.net_unit_price - 0.0).abs() < f64::EPSILON);
        assert_eq!(line.delivery_date, "");
    }

    #[test]
    fn structured_article_data_wins_over_comment_grammar() {
        let row = checkout_row().with_article(ArticleRef {
            number: "505-443-101".into(),
            han: "5936152".into(),
        });
        let line = map_to_order_line(&row, &MappingContext::default());
        assert_eq!(line.article_number, "505-443-101");
        assert_eq!(line.article_han, "5936152");
    }

    #[test]
    fn article_number_column_beats_comment_but_not_structured_data() {
        let row = checkout_row().with(Column::ArticleNumber, "597 61 83-01");
        let line = map_to_order_line(&row, &MappingContext::default());
        assert_eq!(line.article_number, "597 61 83-01");
    }

    #[test]
    fn comment_ending_at_the_vpe_marker_has_no_article_number() {
        let row = RawRow::new().with(Column::Comment, "D-BE12345 VPE=6");
        let line = map_to_order_line(&row, &MappingContext::default());
        assert_eq!(line.internal_order_number, "D-BE12345-I");
        assert_eq!(line.article_number, "");
        // the marker still counts for the quantity
        let row = row.with(Column::Quantity, "2");
        assert_eq!(
            map_to_order_line(&row, &MappingContext::default()).quantity,
            12
        );
    }

    #[test]
    fn comment_without_vpe_still_yields_article_number() {
        let row = RawRow::new().with(Column::Comment, "D-BE777 593275601");
        let line = map_to_order_line(&row, &MappingContext::default());
        assert_eq!(line.internal_order_number, "D-BE777-I");
        assert_eq!(line.article_number, "593275601");
    }

    #[test]
    fn structured_numerics_bypass_text_parsing() {
        let row = RawRow::new()
            .with(Column::Quantity, "völlig kaputt")
            .with(Column::TotalNetPrice, "auch kaputt")
            .with_quantity(3.0)
            .with_line_total(300.0);
        let line = map_to_order_line(&row, &MappingContext::default());
        assert_eq!(line.quantity, 3);
        // 300 * 0.97 / 3
        assert!((line.net_unit_price - 97.0).abs() < 1e-9);
    }

    #[test]
    fn header_internal_number_wins_over_comment_grammar() {
        let ctx = MappingContext::for_order("4711")
            .with_internal_order_number("D-BE000011112222-lang");
        let line = map_to_order_line(&checkout_row(), &ctx);
        assert_eq!(line.internal_order_number, "D-BE0000111122");
        assert_eq!(line.internal_order_number.len(), 14);
    }

    #[test]
    fn cart_totals_apply_the_discount_once() {
        let rows = vec![
            RawRow::new().with(Column::TotalNetPrice, "100,00"),
            RawRow::new().with(Column::TotalNetPrice, "1.900,00"),
            RawRow::new().with(Column::TotalNetPrice, "kaputt"),
        ];
        let totals = cart_totals(&rows, DISCOUNT_FACTOR);
        assert!((totals.total_net - 2000.0).abs() < 1e-9);
        assert!((totals.total_net_discounted - 1940.0).abs() < 1e-9);
    }
}
