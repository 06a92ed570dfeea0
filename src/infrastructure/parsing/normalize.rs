//! Text normalizers for portal-rendered values
//!
//! The host page renders numbers and dates in German conventions and the
//! comment field is free text typed by purchasers. Every function in this
//! module degrades to a neutral value (`NAN`, `""`) instead of failing:
//! the DOM is untrusted input and a single odd cell must not abort a
//! whole extraction pass.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

static NUMERIC_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(\d{1,2})\.\s*(\d{1,2})\.\s*(\d{4})\s*$").unwrap()
});

static VERBOSE_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(\d{1,2})\.?\s+([A-Za-zÄÖÜäöü]+)\.?\s+(\d{4})\s*$").unwrap()
});

/// Parses a European-formatted decimal (`1.808,40` -> `1808.40`).
///
/// Thousands dots are stripped, the decimal comma becomes a point, and any
/// remaining non-numeric characters except a leading minus are discarded.
/// Returns `f64::NAN` for unparsable input; never panics.
#[must_use]
pub fn parse_european_number(text: &str) -> f64 {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return f64::NAN;
    }

    let reordered = trimmed.replace('.', "").replace(',', ".");

    let mut cleaned = String::with_capacity(reordered.len());
    for ch in reordered.chars() {
        if ch.is_ascii_digit() || ch == '.' || (ch == '-' && cleaned.is_empty()) {
            cleaned.push(ch);
        }
    }

    cleaned.parse().unwrap_or(f64::NAN)
}

/// Normalizes a German date to zero-padded `DD.MM.YYYY`.
///
/// Accepts the numeric form (`2.9.2025`) and the verbose form the portal
/// renders in order details (`27. August 2025`, abbreviated month names
/// like `Okt.` included). Returns `""` when neither pattern matches or the
/// date is not a real calendar day; callers treat `""` as "unknown date".
#[must_use]
pub fn format_german_date(text: &str) -> String {
    let (day, month, year) = if let Some(caps) = NUMERIC_DATE.captures(text) {
        let day = caps[1].parse::<u32>().unwrap_or(0);
        let month = caps[2].parse::<u32>().unwrap_or(0);
        let year = caps[3].parse::<i32>().unwrap_or(0);
        (day, month, year)
    } else if let Some(caps) = VERBOSE_DATE.captures(text) {
        let day = caps[1].parse::<u32>().unwrap_or(0);
        let Some(month) = german_month_number(&caps[2]) else {
            return String::new();
        };
        let year = caps[3].parse::<i32>().unwrap_or(0);
        (day, month, year)
    } else {
        return String::new();
    };

    if NaiveDate::from_ymd_opt(year, month, day).is_none() {
        return String::new();
    }

    format!("{day:02}.{month:02}.{year:04}")
}

/// Maps a German month name or common abbreviation to its number.
fn german_month_number(name: &str) -> Option<u32> {
    let lower = name.to_lowercase();
    let number = match lower.as_str() {
        "januar" | "jan" => 1,
        "februar" | "feb" => 2,
        "märz" | "maerz" | "mär" | "mrz" => 3,
        "april" | "apr" => 4,
        "mai" => 5,
        "juni" | "jun" => 6,
        "juli" | "jul" => 7,
        "august" | "aug" => 8,
        "september" | "sept" | "sep" => 9,
        "oktober" | "okt" => 10,
        "november" | "nov" => 11,
        "dezember" | "dez" => 12,
        _ => return None,
    };
    Some(number)
}

/// Extracts one capture group, tolerating empty input, a non-matching
/// pattern, and an out-of-range group index. Returns `""` in every
/// degenerate case instead of panicking.
#[must_use]
pub fn safe_regex_extract(text: &str, pattern: &Regex, group_index: usize) -> String {
    if text.is_empty() {
        return String::new();
    }
    pattern
        .captures(text)
        .and_then(|caps| caps.get(group_index))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// Renders a number in the fixed German convention (`1.234,5678`):
/// comma decimal separator, dot thousands grouping, fixed fraction
/// digits. Independent of the runtime locale. Non-finite values render
/// as `""`.
#[must_use]
pub fn format_german_number(value: f64, fraction_digits: usize) -> String {
    if !value.is_finite() {
        return String::new();
    }

    let rendered = format!("{value:.fraction_digits$}");
    let (int_part, frac_part) = match rendered.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (rendered.as_str(), None),
    };
    let (sign, digits) = match int_part.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", int_part),
    };

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        let remaining = digits.len() - idx;
        if idx > 0 && remaining % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    match frac_part {
        Some(frac) => format!("{sign}{grouped},{frac}"),
        None => format!("{sign}{grouped}"),
    }
}

/// Turns free text into a filesystem-safe `.csv` file name.
///
/// German umlauts are folded to their ASCII digraphs, everything outside
/// `[a-zA-Z0-9_-]` collapses to a single dash, and an empty result falls
/// back to a timestamped name so a download never fails on naming.
#[must_use]
pub fn sanitize_filename(text: &str) -> String {
    let mut folded = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            'ä' => folded.push_str("ae"),
            'ö' => folded.push_str("oe"),
            'ü' => folded.push_str("ue"),
            'Ä' => folded.push_str("Ae"),
            'Ö' => folded.push_str("Oe"),
            'Ü' => folded.push_str("Ue"),
            'ß' => folded.push_str("ss"),
            _ => folded.push(ch),
        }
    }

    let mut cleaned = String::with_capacity(folded.len());
    let mut last_was_dash = false;
    for ch in folded.chars() {
        if ch.is_ascii_alphanumeric() || ch == '_' || ch == '-' {
            cleaned.push(ch);
            last_was_dash = ch == '-';
        } else if !last_was_dash && !cleaned.is_empty() {
            cleaned.push('-');
            last_was_dash = true;
        }
    }
    let cleaned = cleaned.trim_matches('-').to_lowercase();

    if cleaned.is_empty() {
        let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S");
        return format!("export-{stamp}.csv");
    }
    format!("{cleaned}.csv")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("1.808,40", 1808.40)]
    #[case("12,5", 12.5)]
    #[case("1.234.567,89", 1_234_567.89)]
    #[case("42", 42.0)]
    #[case("-3,97", -3.97)]
    #[case("1.808,40 €", 1808.40)]
    fn parses_european_numbers(#[case] input: &str, #[case] expected: f64) {
        let parsed = parse_european_number(input);
        assert!((parsed - expected).abs() < 1e-9, "{input} -> {parsed}");
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case("abc")]
    #[case("-")]
    fn unparsable_numbers_become_nan(#[case] input: &str) {
        assert!(parse_european_number(input).is_nan());
    }

    #[rstest]
    #[case("27. August 2025", "27.08.2025")]
    #[case("2.9.2025", "02.09.2025")]
    #[case("1. Okt. 2024", "01.10.2024")]
    #[case("31. Dez. 2024", "31.12.2024")]
    #[case("07.03.2025", "07.03.2025")]
    fn formats_german_dates(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(format_german_date(input), expected);
    }

    #[rstest]
    #[case("not a date")]
    #[case("32.01.2025")]
    #[case("1. Brumaire 2025")]
    #[case("")]
    fn unknown_dates_become_empty(#[case] input: &str) {
        assert_eq!(format_german_date(input), "");
    }

    #[test]
    fn safe_extract_tolerates_all_degenerate_inputs() {
        let re = Regex::new(r"^(D-BE\S*)").unwrap();
        assert_eq!(safe_regex_extract("D-BE12345 ART", &re, 1), "D-BE12345");
        assert_eq!(safe_regex_extract("", &re, 1), "");
        assert_eq!(safe_regex_extract("no match", &re, 1), "");
        assert_eq!(safe_regex_extract("D-BE12345", &re, 7), "");
    }

    #[rstest]
    #[case(1808.4, 4, "1.808,4000")]
    #[case(1234567.891, 2, "1.234.567,89")]
    #[case(0.97, 4, "0,9700")]
    #[case(-42.5, 2, "-42,50")]
    #[case(12.0, 0, "12")]
    fn formats_german_numbers(#[case] value: f64, #[case] digits: usize, #[case] expected: &str) {
        assert_eq!(format_german_number(value, digits), expected);
    }

    #[test]
    fn non_finite_numbers_render_empty() {
        assert_eq!(format_german_number(f64::NAN, 4), "");
        assert_eq!(format_german_number(f64::INFINITY, 4), "");
    }

    #[test]
    fn sanitizes_filenames() {
        assert_eq!(sanitize_filename("Bestellung 4711/08"), "bestellung-4711-08.csv");
        assert_eq!(sanitize_filename("Motorsäge XL"), "motorsaege-xl.csv");
        assert_eq!(sanitize_filename("--D-BE99--"), "d-be99.csv");
    }

    #[test]
    fn empty_filename_falls_back_to_timestamp() {
        let name = sanitize_filename("   ");
        assert!(name.starts_with("export-"), "{name}");
        assert!(name.ends_with(".csv"));
    }
}
