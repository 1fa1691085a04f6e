//! `{placeholder}` substitution for action commands.
//!
//! `{{` and `}}` produce literal braces; a lone `}` is kept as-is.

use crate::error::{DocketError, Result};
use std::collections::BTreeMap;

/// Substitute `{name}` placeholders in `template` from `variables`.
pub(crate) fn render(template: &str, variables: &BTreeMap<&str, String>) -> Result<String> {
    let mut result = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();

    while let Some((pos, ch)) = chars.next() {
        match ch {
            '{' if matches!(chars.peek(), Some((_, '{'))) => {
                chars.next();
                result.push('{');
            }
            '{' => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some((_, '}')) => break,
                        Some((_, c)) => name.push(c),
                        None => {
                            return Err(DocketError::UserError(format!(
                                "unmatched '{{' at position {} in '{}'",
                                pos, template
                            )));
                        }
                    }
                }

                let name = name.trim();
                match variables.get(name) {
                    Some(value) => result.push_str(value),
                    None => {
                        let known: Vec<&str> = variables.keys().copied().collect();
                        return Err(DocketError::UserError(format!(
                            "unknown placeholder '{{{}}}' in '{}' (available: {})",
                            name,
                            template,
                            known.join(", ")
                        )));
                    }
                }
            }
            '}' if matches!(chars.peek(), Some((_, '}'))) => {
                chars.next();
                result.push('}');
            }
            other => result.push(other),
        }
    }

    Ok(result)
}
