//! CSV serialization for the downstream merchandise management import
//!
//! Semicolon-delimited, header row fixed by the downstream system,
//! decimal values rendered German-style. The serializer also enforces the
//! one business guard the cart export always had: a batch mixing lines of
//! more than one internal order number is refused, because the downstream
//! import books the whole file onto a single order.

use std::collections::BTreeSet;

use tracing::debug;

use super::parsing::normalize::{format_german_number, sanitize_filename};
use crate::domain::constants::{CSV_HEADER, CSV_SEPARATOR, PRICE_FRACTION_DIGITS};
use crate::domain::OrderLine;

#[derive(Debug, thiserror::Error)]
pub enum CsvError {
    /// "Zu viele interne Bestellnummern": one export file must carry
    /// exactly one internal order number.
    #[error("batch mixes {} internal order numbers: {}", .numbers.len(), .numbers.join(", "))]
    MixedInternalOrderNumbers { numbers: Vec<String> },
}

/// Serializes mapped lines to the interchange CSV.
///
/// # Errors
/// [`CsvError::MixedInternalOrderNumbers`] when the batch carries more
/// than one distinct non-empty internal order number.
pub fn to_csv(lines: &[OrderLine]) -> Result<String, CsvError> {
    let distinct = distinct_internal_order_numbers(lines);
    if distinct.len() > 1 {
        return Err(CsvError::MixedInternalOrderNumbers {
            numbers: distinct.into_iter().collect(),
        });
    }

    let mut out = String::new();
    push_record(&mut out, CSV_HEADER.iter().map(|h| (*h).to_string()));

    for line in lines {
        push_record(
            &mut out,
            [
                line.article_han.clone(),
                line.internal_order_number.clone(),
                line.article_number.clone(),
                line.description.clone(),
                line.quantity.to_string(),
                format_german_number(line.net_unit_price, PRICE_FRACTION_DIGITS),
                line.delivery_date.clone(),
                line.free_position.clone(),
                line.external_order_number.clone(),
            ]
            .into_iter(),
        );
    }

    debug!(lines = lines.len(), "serialized CSV batch");
    Ok(out)
}

/// Distinct non-empty internal order numbers across a batch.
#[must_use]
pub fn distinct_internal_order_numbers(lines: &[OrderLine]) -> BTreeSet<String> {
    lines
        .iter()
        .filter(|l| !l.internal_order_number.is_empty())
        .map(|l| l.internal_order_number.clone())
        .collect()
}

/// File name for one order's export.
#[must_use]
pub fn export_filename(order_number: &str) -> String {
    sanitize_filename(order_number)
}

fn push_record(out: &mut String, fields: impl Iterator<Item = String>) {
    let mut first = true;
    for field in fields {
        if !first {
            out.push(CSV_SEPARATOR);
        }
        first = false;
        out.push_str(&escape_field(&field));
    }
    out.push_str("\r\n");
}

/// Quotes a field when it contains the separator, quotes, or line breaks.
fn escape_field(field: &str) -> String {
    if field.contains(CSV_SEPARATOR)
        || field.contains('"')
        || field.contains('\n')
        || field.contains('\r')
    {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(internal: &str) -> OrderLine {
        OrderLine {
            article_han: "593275601".into(),
            internal_order_number: internal.into(),
            article_number: "ART-99".into(),
            description: "Fadenkopf T25".into(),
            quantity: 12,
            net_unit_price: 4.1872,
            delivery_date: "05.09.2025".into(),
            free_position: "N".into(),
            external_order_number: "4711".into(),
        }
    }

    #[test]
    fn header_matches_the_downstream_contract_exactly() {
        let csv = to_csv(&[]).unwrap();
        assert_eq!(
            csv,
            "HAN;Interne Bestellnummer;Artikelnummer;Lieferantenbezeichnung;menge;EK netto;Lieferdatum;Freiposition;Fremdbelegnummer\r\n"
        );
    }

    #[test]
    fn renders_decimal_fields_with_comma() {
        let csv = to_csv(&[line("D-BE12345-I")]).unwrap();
        let data_row = csv.lines().nth(1).unwrap();
        assert_eq!(
            data_row,
            "593275601;D-BE12345-I;ART-99;Fadenkopf T25;12;4,1872;05.09.2025;N;4711"
        );
    }

    #[test]
    fn refuses_batches_with_mixed_internal_order_numbers() {
        let err = to_csv(&[line("D-BE1-I"), line("D-BE2-I")]).unwrap_err();
        let CsvError::MixedInternalOrderNumbers { numbers } = err;
        assert_eq!(numbers, vec!["D-BE1-I".to_string(), "D-BE2-I".to_string()]);
    }

    #[test]
    fn lines_without_internal_number_do_not_trip_the_guard() {
        let csv = to_csv(&[line(""), line("D-BE1-I"), line("")]).unwrap();
        assert_eq!(csv.lines().count(), 4);
    }

    #[test]
    fn fields_containing_the_separator_are_quoted() {
        let mut odd = line("D-BE1-I");
        odd.description = "Öl; 1l \"Bio\"".into();
        let csv = to_csv(&[odd]).unwrap();
        assert!(csv.contains(r#""Öl; 1l ""Bio""""#));
    }

    #[test]
    fn export_filename_derives_from_the_order_number() {
        assert_eq!(export_filename("DE4711/08"), "de4711-08.csv");
    }
}
