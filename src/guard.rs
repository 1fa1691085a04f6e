//! Optimistic concurrency guard.
//!
//! Writers that read a document, think, then write can clobber a change made
//! in between even when every write is serialized by the repo lock. The guard
//! closes that gap: the reader remembers the document's content hash, and the
//! write goes through only if the document still hashes the same.
//!
//! Hashes are SHA-256 over a canonical JSON rendering (object keys sorted,
//! no insignificant whitespace, CRLF folded to LF and trailing whitespace
//! trimmed inside strings), so key order and editor line endings do not
//! register as changes.

use crate::document::split_frontmatter;
use crate::error::{DocketError, Result};
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Result of a guard check. A conflict is data, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    Ok,
    /// The document changed since the caller read it.
    Conflict { current_hash: String },
}

impl GuardOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, GuardOutcome::Ok)
    }
}

/// Compare `expected` against the hash of `current`.
///
/// No expected hash means the caller opted out and the check passes.
pub fn check(expected: Option<&str>, current: &Value) -> GuardOutcome {
    match expected {
        None => GuardOutcome::Ok,
        Some(expected) => check_hash(Some(expected), &hash_value(current)),
    }
}

/// Like [`check`] for a hash computed elsewhere.
pub fn check_hash(expected: Option<&str>, current_hash: &str) -> GuardOutcome {
    match expected {
        Some(expected) if !expected.trim().eq_ignore_ascii_case(current_hash) => {
            GuardOutcome::Conflict {
                current_hash: current_hash.to_string(),
            }
        }
        _ => GuardOutcome::Ok,
    }
}

/// SHA-256 hex digest of the canonical form of `value`.
pub fn hash_value(value: &Value) -> String {
    let mut canonical = String::new();
    write_canonical(value, &mut canonical);
    hex::encode(Sha256::digest(canonical.as_bytes()))
}

/// Hash any serializable document.
pub fn hash_serializable<T: Serialize + ?Sized>(document: &T) -> Result<String> {
    let value = serde_json::to_value(document)
        .map_err(|e| DocketError::UserError(format!("failed to canonicalize document: {}", e)))?;
    Ok(hash_value(&value))
}

/// Hash a frontmatter document as `{"frontmatter": ..., "body": ...}`.
pub fn document_hash<F: Serialize + ?Sized>(frontmatter: &F, body: &str) -> Result<String> {
    let frontmatter = serde_json::to_value(frontmatter)
        .map_err(|e| DocketError::UserError(format!("failed to canonicalize frontmatter: {}", e)))?;
    Ok(hash_value(&serde_json::json!({
        "frontmatter": frontmatter,
        "body": body,
    })))
}

/// Hash raw markdown-with-frontmatter content.
pub fn hash_markdown(content: &str) -> Result<String> {
    let (yaml, body) = split_frontmatter(content)?;
    let frontmatter: serde_yaml::Value = if yaml.trim().is_empty() {
        serde_yaml::Value::Null
    } else {
        serde_yaml::from_str(&yaml)
            .map_err(|e| DocketError::UserError(format!("failed to parse frontmatter: {}", e)))?
    };
    document_hash(&frontmatter, &body)
}

fn normalize_text(text: &str) -> String {
    text.replace("\r\n", "\n")
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim_end()
        .to_string()
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::String(text) => out.push_str(&Value::String(normalize_text(text)).to_string()),
        scalar => out.push_str(&scalar.to_string()),
    }
}
