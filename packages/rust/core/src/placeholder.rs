//! Token mapping and placeholder substitution.
//!
//! A row becomes a [`TokenMap`] of `<Column>` → value. Substitution walks the
//! text once, left to right, matching the literal token keys, so resolved
//! values are never rescanned.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use chrono::{NaiveDate, NaiveDateTime};
use tracing::debug;

use documint_shared::{ColumnFormat, Document, DocumintError, Paragraph, Result, Row};

// ---------------------------------------------------------------------------
// TokenMap
// ---------------------------------------------------------------------------

/// Per-row mapping from `<Column>` to substitution text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenMap(BTreeMap<String, String>);

impl TokenMap {
    /// Insert a value for `column`, keyed as `<column>`.
    pub fn insert(&mut self, column: &str, value: impl Into<String>) {
        self.0.insert(token_key(column), value.into());
    }

    /// Look up a full token such as `<Name>`.
    pub fn get(&self, token: &str) -> Option<&str> {
        self.0.get(token).map(String::as_str)
    }

    /// Look up a template field, written either `<Name>` or `Name`.
    pub fn field(&self, field: &str) -> Option<&str> {
        if field.starts_with('<') && field.ends_with('>') && field.len() >= 2 {
            self.get(field)
        } else {
            self.get(&token_key(field))
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

fn token_key(column: &str) -> String {
    format!("<{column}>")
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Build the token mapping for `row` using each value's source text, trimmed.
pub fn resolve(row: &Row) -> TokenMap {
    let mut tokens = TokenMap::default();
    for (column, value) in &row.cells {
        tokens.insert(column, value.trim());
    }
    tokens
}

/// Build the token mapping for `row`, applying any configured column formatters.
///
/// Fails with [`DocumintError::Format`] if a formatter cannot interpret its value.
pub fn resolve_with(row: &Row, formatters: &BTreeMap<String, ColumnFormat>) -> Result<TokenMap> {
    let mut tokens = TokenMap::default();
    for (column, value) in &row.cells {
        let text = match formatters.get(column) {
            Some(format) => apply_format(format, value).map_err(|reason| {
                DocumintError::Format(format!("column '{column}': {reason}"))
            })?,
            None => value.trim().to_string(),
        };
        tokens.insert(column, text);
    }
    Ok(tokens)
}

/// Format a single raw cell value. Blank cells stay blank under every format.
pub fn apply_format(format: &ColumnFormat, raw: &str) -> std::result::Result<String, String> {
    let value = raw.trim();
    if value.is_empty() {
        return Ok(String::new());
    }

    match format {
        ColumnFormat::Raw => Ok(value.to_string()),
        ColumnFormat::Upper => Ok(value.to_uppercase()),
        ColumnFormat::Lower => Ok(value.to_lowercase()),
        ColumnFormat::Integer => format_integer(value),
        ColumnFormat::Fixed { places } => {
            let number = parse_number(value)?;
            Ok(format!("{number:.places$}"))
        }
        ColumnFormat::Date { input, output } => format_date(value, input, output),
    }
}

fn parse_number(value: &str) -> std::result::Result<f64, String> {
    value
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .ok_or_else(|| format!("'{value}' is not a number"))
}

fn format_integer(value: &str) -> std::result::Result<String, String> {
    if let Ok(n) = value.parse::<i64>() {
        return Ok(n.to_string());
    }
    let number = parse_number(value)?;
    // Beyond 2^53 an f64 no longer holds every integer exactly.
    if number.fract() != 0.0 || number.abs() > 9_007_199_254_740_992.0 {
        return Err(format!("'{value}' is not a whole number"));
    }
    Ok(format!("{number:.0}"))
}

fn format_date(value: &str, input: &str, output: &str) -> std::result::Result<String, String> {
    let mut out = String::new();
    let written = if let Ok(dt) = NaiveDateTime::parse_from_str(value, input) {
        write!(out, "{}", dt.format(output))
    } else if let Ok(date) = NaiveDate::parse_from_str(value, input) {
        write!(out, "{}", date.format(output))
    } else {
        return Err(format!("'{value}' does not match date format '{input}'"));
    };
    written.map_err(|_| format!("invalid output date format '{output}'"))?;
    Ok(out)
}

// ---------------------------------------------------------------------------
// Substitution
// ---------------------------------------------------------------------------

/// Replace every occurrence of a token key in `text` in a single pass.
///
/// Keys are matched literally, so column names may themselves contain `<` or
/// `>`. Where keys overlap at one position the longest wins. Unknown `<...>`
/// sequences are kept verbatim.
pub fn substitute(text: &str, tokens: &TokenMap) -> String {
    let mut keys: Vec<(&str, &str)> = tokens.iter().collect();
    keys.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    'scan: while let Some(c) = rest.chars().next() {
        // every key starts with '<'
        if c == '<' {
            for (key, value) in &keys {
                if let Some(after) = rest.strip_prefix(*key) {
                    out.push_str(value);
                    rest = after;
                    continue 'scan;
                }
            }
        }
        out.push(c);
        rest = &rest[c.len_utf8()..];
    }
    out
}

/// Produce a filled copy of `template`.
///
/// Every paragraph, top-level or in a table cell, whose text changes is
/// replaced by a single plain run holding the new text; other paragraphs keep
/// their runs and formatting.
pub fn render(template: &Document, tokens: &TokenMap) -> Document {
    let mut doc = template.clone();
    let mut rewritten = 0usize;

    for paragraph in doc.paragraphs_mut() {
        let original = paragraph.text();
        let filled = substitute(&original, tokens);
        if filled != original {
            *paragraph = Paragraph::plain(filled);
            rewritten += 1;
        }
    }

    debug!(rewritten, "placeholders substituted");
    doc
}
