//! Line classification: the first stage of reading a CITI file, turning a
//! single already trailing-whitespace-trimmed line into a tagged [`Line`].

use crate::numeric::{parse_real, split_pair};

/// One classified source line. Blank lines are not represented here — the
/// caller skips them before classification (see [`classify`]'s doc comment).
#[derive(Debug, Clone, PartialEq)]
pub enum Line {
    /// A `!`-prefixed comment; `text` is everything after `!`, with at most
    /// one leading space consumed.
    Comment(String),
    /// A line whose first whitespace-separated token is all-uppercase: the
    /// keyword and the remainder of the line.
    Keyword(String, String),
    /// A `#`-prefixed device line: the device name token and the remainder.
    DeviceLine(String, String),
    /// A single comma-separated pair of real numbers.
    NumericPair(f64, f64),
    /// A single real number with no comma.
    NumericSingle(f64),
    /// Anything else — on a non-blank line this is always a parser error at
    /// the call site, since every legitimate content line in a CITI file is
    /// one of the other variants.
    Other(String),
}

/// Classify one line, after trimming trailing `\r`/`\n` and any trailing
/// whitespace. `line_number` is used only to build a reasonably specific
/// [`crate::error::CitiError::BadNumber`] if a numeric-shaped line turns out
/// to contain something `parse_real` rejects.
pub fn classify(raw: &str, line_number: usize) -> Line {
    let trimmed_end = raw.trim_end_matches(['\r', '\n']);
    let trimmed = trimmed_end.trim_end();

    if let Some(rest) = trimmed.strip_prefix('!') {
        let text = rest.strip_prefix(' ').unwrap_or(rest);
        return Line::Comment(text.to_string());
    }

    if let Some(rest) = trimmed.strip_prefix('#') {
        let (name, remainder) = split_first_token(rest);
        return Line::DeviceLine(name.to_string(), remainder.to_string());
    }

    if trimmed.is_empty() {
        return Line::Other(String::new());
    }

    if is_keyword_line(trimmed) {
        let (word, rest) = split_first_token(trimmed);
        return Line::Keyword(word.to_string(), rest.to_string());
    }

    if let Some((a, b)) = split_pair(trimmed) {
        if let (Ok(a), Ok(b)) = (parse_real(a, line_number), parse_real(b, line_number)) {
            return Line::NumericPair(a, b);
        }
    } else if let Ok(value) = parse_real(trimmed, line_number) {
        return Line::NumericSingle(value);
    }

    Line::Other(trimmed.to_string())
}

/// A line is keyword-shaped if its first whitespace-separated token is
/// non-empty and every character in it is an uppercase ASCII letter,
/// digit, or underscore, with at least one letter (so a bare numeric line
/// or pair is never mistaken for a keyword).
fn is_keyword_line(trimmed: &str) -> bool {
    let (first, _) = split_first_token(trimmed);
    !first.is_empty()
        && first.chars().any(|c| c.is_ascii_uppercase())
        && first.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

fn split_first_token(s: &str) -> (&str, &str) {
    match s.find(char::is_whitespace) {
        Some(idx) => (&s[..idx], s[idx..].trim_start()),
        None => (s, ""),
    }
}
