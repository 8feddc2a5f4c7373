//! Brace-field templates for output file names and message bodies.
//!
//! `{<ID>}` and `{ID}` both insert the value of column `ID`; `{{` and `}}` are
//! literal braces.

use documint_shared::{DocumintError, Result};

use crate::placeholder::TokenMap;

/// Fill every `{field}` in `pattern` from `tokens`.
pub fn format_template(pattern: &str, tokens: &TokenMap) -> Result<String> {
    let mut out = String::with_capacity(pattern.len());
    let mut chars = pattern.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '{' => {
                let mut field = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    match c {
                        '}' => {
                            closed = true;
                            break;
                        }
                        '{' => {
                            return Err(DocumintError::Format(format!(
                                "unexpected '{{' inside field in '{pattern}'"
                            )));
                        }
                        _ => field.push(c),
                    }
                }
                if !closed {
                    return Err(DocumintError::Format(format!(
                        "unclosed '{{' in '{pattern}'"
                    )));
                }
                if field.is_empty() {
                    return Err(DocumintError::Format(format!(
                        "empty field '{{}}' in '{pattern}'"
                    )));
                }
                let value = tokens.field(&field).ok_or_else(|| {
                    DocumintError::Format(format!("unknown field '{field}' in '{pattern}'"))
                })?;
                out.push_str(value);
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '}' => {
                return Err(DocumintError::Format(format!(
                    "single '}}' in '{pattern}'"
                )));
            }
            _ => out.push(c),
        }
    }

    Ok(out)
}

/// Render an output basename. The result must be a single path component.
pub fn format_name(pattern: &str, tokens: &TokenMap) -> Result<String> {
    let name = format_template(pattern, tokens)?;
    let trimmed = name.trim();

    if trimmed.is_empty() || trimmed == "." || trimmed == ".." {
        return Err(DocumintError::Format(format!(
            "pattern '{pattern}' produced an unusable file name '{name}'"
        )));
    }
    if trimmed.contains(['/', '\\']) {
        return Err(DocumintError::Format(format!(
            "file name '{trimmed}' contains a path separator"
        )));
    }

    Ok(trimmed.to_string())
}
