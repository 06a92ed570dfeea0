//! Business constants shared across the export pipeline
//!
//! These values are fixed business rules of the dealership's purchasing
//! workflow. They are named here once instead of being scattered as magic
//! numbers through the mapping and pricing code.

/// Early-payment discount (Skonto) applied uniformly to net purchase prices.
///
/// 0.97 == 3% Skonto. Applied to the line total before the per-unit price
/// is derived.
pub const DISCOUNT_FACTOR: f64 = 0.97;

/// Fraction digits used when rendering `EK netto` values.
pub const PRICE_FRACTION_DIGITS: usize = 4;

/// Maximum length of the internal order number accepted by the downstream
/// merchandise management system (fixed-width field).
pub const INTERNAL_ORDER_NUMBER_MAX_LEN: usize = 14;

/// Suffix appended to the internal order reference extracted from the
/// comment field before truncation.
pub const INTERNAL_ORDER_NUMBER_SUFFIX: &str = "-I";

/// Value of the `Freiposition` flag for every exported line.
pub const FREE_POSITION: &str = "N";

/// CSV header row expected by the downstream import, field order included.
pub const CSV_HEADER: [&str; 9] = [
    "HAN",
    "Interne Bestellnummer",
    "Artikelnummer",
    "Lieferantenbezeichnung",
    "menge",
    "EK netto",
    "Lieferdatum",
    "Freiposition",
    "Fremdbelegnummer",
];

/// CSV field delimiter of the downstream import.
pub const CSV_SEPARATOR: char = ';';
