use crate::domain::record::{CellValue, RawCell};

/// Coerces one raw cell into a number, or into its trimmed text when it is not numeric.
///
/// Blank markers (`""`, `"-"`, `" "`) and empty cells become `0`. Numbers pass through.
/// Text is stripped of surrounding quotes and whitespace and of interior whitespace and
/// thousands separators, then read by its longest numeric prefix, so `"1.5倍"` is `1.5`.
/// A `%` anywhere divides by 100 (unparseable percentages become `0`). Never fails.
pub fn normalize_cell(raw: &RawCell) -> CellValue {
    match raw {
        RawCell::Empty => CellValue::Number(0.0),
        RawCell::Number(v) => CellValue::Number(*v),
        RawCell::Text(s) => normalize_text(s),
    }
}

fn normalize_text(s: &str) -> CellValue {
    if matches!(s, "" | "-" | " ") {
        return CellValue::Number(0.0);
    }

    let trimmed = s.trim();
    let cleaned: String = trimmed
        .trim_matches(|c: char| c == '"' || c == '\'' || c.is_whitespace())
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();

    if cleaned.contains('%') {
        let numeric = cleaned.replacen('%', "", 1);
        return CellValue::Number(parse_float_prefix(&numeric).map_or(0.0, |v| v / 100.0));
    }

    match parse_float_prefix(&cleaned) {
        Some(v) => CellValue::Number(v),
        None => CellValue::Text(trimmed.to_string()),
    }
}

/// Reads the longest leading decimal literal after any leading whitespace and ignores the
/// rest: optional sign, digits with an optional fraction, optional exponent, or `Infinity`.
/// `None` when no digits lead the string.
pub fn parse_float_prefix(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let bytes = s.as_bytes();

    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    if s[end..].starts_with("Infinity") {
        return Some(if s.starts_with('-') {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        });
    }

    let int_digits = leading_digits(&bytes[end..]);
    end += int_digits;

    let mut frac_digits = 0;
    if bytes.get(end) == Some(&b'.') {
        frac_digits = leading_digits(&bytes[end + 1..]);
        if int_digits > 0 || frac_digits > 0 {
            end += 1 + frac_digits;
        }
    }
    if int_digits == 0 && frac_digits == 0 {
        return None;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp = end + 1;
        if matches!(bytes.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        let exp_digits = leading_digits(&bytes[exp..]);
        if exp_digits > 0 {
            end = exp + exp_digits;
        }
    }

    s[..end].parse::<f64>().ok()
}

fn leading_digits(bytes: &[u8]) -> usize {
    bytes.iter().take_while(|b| b.is_ascii_digit()).count()
}
