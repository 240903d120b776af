//! Money-cell parsing for spreadsheet exports and hand-typed amounts.
//!
//! Handles "$1,234,567", surrounding whitespace, and the Unicode minus sign
//! (U+2212) that some spreadsheet tools emit for negative values.

use serde_json::Value;

/// Strict parse of a single cell. `None` means the cell held something that
/// is not a finite number.
pub fn parse_currency_checked(cell: &Value) -> Option<f64> {
    match cell {
        Value::Null => None,
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => parse_currency_str(s),
        _ => None,
    }
}

/// Lenient parse used during bulk import: malformed cells become `0.0` so a
/// single bad cell never aborts a whole upload. Defined in terms of
/// [`parse_currency_checked`] so the two paths cannot disagree on what
/// counts as parseable.
pub fn parse_currency_cell(cell: &Value) -> f64 {
    parse_currency_checked(cell).unwrap_or(0.0)
}

/// Parse currency-like text: strips `$`, thousands commas, and all
/// whitespace, then maps Unicode minus to ASCII `-`.
pub fn parse_currency_str(s: &str) -> Option<f64> {
    let cleaned: String = s
        .chars()
        .filter(|c| *c != '$' && *c != ',' && !c.is_whitespace())
        .map(|c| if c == '\u{2212}' { '-' } else { c })
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parses_symbols_and_separators() {
        assert_eq!(parse_currency_str("$1,234,567"), Some(1_234_567.0));
        assert_eq!(parse_currency_str(" $2,500.75 "), Some(2500.75));
        assert_eq!(parse_currency_str("1 234"), Some(1234.0));
    }

    #[test]
    fn test_negative_forms() {
        assert_eq!(parse_currency_str("-$500"), Some(-500.0));
        assert_eq!(parse_currency_str("\u{2212}$500"), Some(-500.0));
        assert_eq!(parse_currency_str("$\u{2212}500"), Some(-500.0));
    }

    #[test]
    fn test_numbers_pass_through() {
        assert_eq!(parse_currency_cell(&json!(42.5)), 42.5);
        assert_eq!(parse_currency_cell(&json!(-3)), -3.0);
    }

    #[test]
    fn test_lenient_coerces_garbage_to_zero() {
        assert_eq!(parse_currency_cell(&json!("not money")), 0.0);
        assert_eq!(parse_currency_cell(&json!("")), 0.0);
        assert_eq!(parse_currency_cell(&Value::Null), 0.0);
        assert_eq!(parse_currency_cell(&json!({"nested": 1})), 0.0);
    }

    #[test]
    fn test_checked_distinguishes_invalid() {
        assert_eq!(parse_currency_checked(&json!("oops")), None);
        assert_eq!(parse_currency_checked(&json!("$12")), Some(12.0));
        assert_eq!(parse_currency_checked(&Value::Null), None);
    }

    #[test]
    fn test_whitespace_only_is_invalid() {
        assert_eq!(parse_currency_str("   "), None);
        assert_eq!(parse_currency_str("$"), None);
    }
}
