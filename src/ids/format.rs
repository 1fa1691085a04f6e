//! ID rendering and key validation.

use crate::config::IdFormatConfig;
use crate::error::{DocketError, Result};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

static KEY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("Invalid key regex"));

/// Check that a namespace or category is a plain identifier.
///
/// `kind` names the argument in the error message.
pub fn validate_key(kind: &str, value: &str) -> Result<()> {
    if KEY_REGEX.is_match(value) {
        Ok(())
    } else {
        Err(DocketError::UserError(format!(
            "invalid {} '{}': only letters, digits and '_' are allowed",
            kind, value
        )))
    }
}

/// Categories with a built-in format.
const BUILTIN_CATEGORIES: [&str; 3] = ["card", "idea", "task"];

/// Validate a counter key and return it in canonical case: namespaces
/// upper-case (as rendered in IDs), categories lower-case.
pub(crate) fn canonical_key(namespace: &str, category: &str) -> Result<(String, String)> {
    validate_key("namespace", namespace)?;
    validate_key("category", category)?;
    Ok((namespace.to_ascii_uppercase(), category.to_ascii_lowercase()))
}

/// Format for `category`: a configured override, a built-in, or the default
/// (upper-cased category as infix, width 3). Categories match case-insensitively.
pub fn resolve_format(
    category: &str,
    overrides: &BTreeMap<String, IdFormatConfig>,
) -> IdFormatConfig {
    if let Some((_, format)) = overrides
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(category))
    {
        return format.clone();
    }

    let (infix, width) = match category.to_ascii_lowercase().as_str() {
        "card" => (None, 3),
        "idea" => (Some("OPP".to_string()), 4),
        "task" => (Some("TASK".to_string()), 4),
        other => (Some(other.to_ascii_uppercase()), 3),
    };
    IdFormatConfig { infix, width }
}

/// The infix as rendered, `None` when the ID has none.
fn rendered_infix(format: &IdFormatConfig) -> Option<String> {
    format
        .infix
        .as_deref()
        .filter(|infix| !infix.is_empty())
        .map(str::to_ascii_uppercase)
}

/// Reject `category` when another category of the same namespace renders
/// with the same infix. Padding alone does not separate two counters: once
/// values outgrow the width, `X-OPP-1000` is the same string at any width.
///
/// `in_use` lists categories that already have counters in the namespace.
pub(crate) fn ensure_distinct_infix<'a>(
    category: &str,
    in_use: impl IntoIterator<Item = &'a String>,
    overrides: &BTreeMap<String, IdFormatConfig>,
) -> Result<()> {
    let infix = rendered_infix(&resolve_format(category, overrides));

    let others = BUILTIN_CATEGORIES
        .iter()
        .map(|c| c.to_string())
        .chain(overrides.keys().map(|c| c.to_ascii_lowercase()))
        .chain(in_use.into_iter().map(|c| c.to_ascii_lowercase()));

    for other in others {
        if other == category {
            continue;
        }
        if rendered_infix(&resolve_format(&other, overrides)) == infix {
            return Err(DocketError::UserError(format!(
                "category '{}' would render the same IDs as category '{}'",
                category, other
            )));
        }
    }
    Ok(())
}

/// Render `value` as `<NAMESPACE>[-<INFIX>]-<zero padded value>`.
///
/// Values wider than the configured width are printed in full.
pub fn format_id(
    namespace: &str,
    category: &str,
    value: u64,
    overrides: &BTreeMap<String, IdFormatConfig>,
) -> String {
    let format = resolve_format(category, overrides);
    let namespace = namespace.to_ascii_uppercase();

    match rendered_infix(&format) {
        Some(infix) => format!(
            "{}-{}-{:0width$}",
            namespace,
            infix,
            value,
            width = format.width
        ),
        None => format!("{}-{:0width$}", namespace, value, width = format.width),
    }
}
