//! Permissive real-number parsing and canonical scientific-notation
//! formatting for CITI numeric lines (independent-variable samples and
//! data-array real/imaginary pairs).

use crate::error::{CitiError, Result};

/// Parse a single real number token. Accepts a leading sign, a decimal
/// point, and an `e`/`E` exponent with its own optional sign — the grammar
/// `std::str::FromStr for f64` already implements, minus the `inf`/`nan`
/// spellings a CITI file never legitimately contains.
pub fn parse_real(token: &str, line: usize) -> Result<f64> {
    let trimmed = token.trim();
    if trimmed.is_empty() || !looks_numeric(trimmed) {
        return Err(CitiError::BadNumber { line, token: token.to_string() });
    }
    trimmed.parse::<f64>().map_err(|_| CitiError::BadNumber { line, token: token.to_string() })
}

/// Reject tokens `f64::from_str` would otherwise happily accept but that
/// have no business in a CITI numeric line, such as `inf`, `nan`, or a bare
/// sign.
fn looks_numeric(s: &str) -> bool {
    let mut chars = s.chars().peekable();
    if matches!(chars.peek(), Some('+') | Some('-')) {
        chars.next();
    }
    let mut saw_digit = false;
    for c in chars {
        if c.is_ascii_digit() {
            saw_digit = true;
            continue;
        }
        if c == '.' || c == 'e' || c == 'E' || c == '+' || c == '-' {
            continue;
        }
        return false;
    }
    saw_digit
}

/// Split a numeric line on its first comma into exactly two tokens, or
/// return `None` if there isn't exactly one comma-separated pair (a
/// trailing comma or extra tokens is the caller's cue to report `-23`).
pub fn split_pair(s: &str) -> Option<(&str, &str)> {
    let mut parts = s.splitn(3, ',');
    let a = parts.next()?;
    let b = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    Some((a, b))
}

/// Format a real number in the uppercase-`E` scientific notation CITI files
/// use, preserving enough significant digits to round-trip losslessly.
pub fn format_real(value: f64) -> String {
    if value == 0.0 {
        return "0E+0".to_string();
    }

    // `{:E}` gives us e.g. "1.31189e-3"; round-trip through the shortest
    // representation `{}` would lose the canonical exponent form, so we
    // build the exponent ourselves from the value's magnitude.
    let exponent = value.abs().log10().floor() as i32;
    let mantissa = value / 10f64.powi(exponent);

    // Guard against log10/rounding pushing the mantissa out of [1, 10).
    let (mantissa, exponent) = normalize_mantissa(mantissa, exponent);

    let mantissa_str = format_mantissa(mantissa);
    let sign = if exponent < 0 { "-" } else { "+" };
    format!("{mantissa_str}E{sign}{}", exponent.abs())
}

fn normalize_mantissa(mut mantissa: f64, mut exponent: i32) -> (f64, i32) {
    while mantissa.abs() >= 10.0 {
        mantissa /= 10.0;
        exponent += 1;
    }
    while mantissa.abs() < 1.0 && mantissa != 0.0 {
        mantissa *= 10.0;
        exponent -= 1;
    }
    (mantissa, exponent)
}

fn format_mantissa(mantissa: f64) -> String {
    // 15 significant digits after the point is enough to round-trip any
    // f64 losslessly; trim the trailing zeros a human would not write.
    let raw = format!("{mantissa:.15}");
    let trimmed = raw.trim_end_matches('0');
    let trimmed = trimmed.trim_end_matches('.');
    if trimmed.contains('.') { trimmed.to_string() } else { format!("{trimmed}.0") }
}
