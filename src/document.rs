//! Frontmatter documents.
//!
//! Task descriptors and run records share one on-disk shape: a YAML header
//! delimited by `---` lines followed by a free-text markdown body.
//!
//! ```text
//! ---
//! Type: agent-task
//! ID: AGENT-TASK-0001
//! Status: pending
//! ---
//!
//! Free text...
//! ```
//!
//! Bodies are preserved byte-for-byte (including CRLF line endings) across a
//! parse/render cycle; only the header is re-serialized.

use crate::error::{DocketError, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;

/// A parsed document: typed header plus verbatim body.
#[derive(Debug, Clone, PartialEq)]
pub struct Document<F> {
    pub frontmatter: F,
    /// Everything after the closing `---` line.
    pub body: String,
}

impl<F: DeserializeOwned> Document<F> {
    /// Parse a document from its content string.
    pub fn parse(content: &str) -> Result<Self> {
        let (yaml, body) = split_frontmatter(content)?;
        let frontmatter = serde_yaml::from_str(&yaml)
            .map_err(|e| DocketError::UserError(format!("failed to parse frontmatter: {}", e)))?;
        Ok(Self { frontmatter, body })
    }

    /// Load and parse a document from disk.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            DocketError::UserError(format!("failed to read '{}': {}", path.display(), e))
        })?;
        Self::parse(&content)
    }
}

impl<F: Serialize> Document<F> {
    /// Serialize the header and append the body.
    pub fn render(&self) -> Result<String> {
        let yaml = serde_yaml::to_string(&self.frontmatter).map_err(|e| {
            DocketError::UserError(format!("failed to serialize frontmatter: {}", e))
        })?;

        let mut output = String::with_capacity(yaml.len() + self.body.len() + 8);
        output.push_str("---\n");
        output.push_str(&yaml);
        output.push_str("---\n");
        output.push_str(&self.body);
        Ok(output)
    }

    /// Atomically write the document to disk.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        crate::fs::atomic_write_file(path, &self.render()?)
    }
}

/// Split raw content into (header YAML, body).
///
/// Delimiters are detected on LF-normalized text, but the body is sliced
/// from the original so its line endings survive.
pub fn split_frontmatter(content: &str) -> Result<(String, String)> {
    let normalized = content.replace("\r\n", "\n");

    let first_newline = normalized.find('\n').unwrap_or(normalized.len());
    if !is_delimiter(&normalized[..first_newline]) {
        return Err(DocketError::UserError(
            "document must start with '---' frontmatter delimiter".to_string(),
        ));
    }
    if first_newline == normalized.len() {
        return Err(DocketError::UserError("frontmatter is incomplete".to_string()));
    }

    let rest = &normalized[first_newline + 1..];
    let mut line_start = 0;
    let (yaml, closing_len) = loop {
        let line_end = rest[line_start..]
            .find('\n')
            .map_or(rest.len(), |i| line_start + i);
        if is_delimiter(&rest[line_start..line_end]) {
            break (&rest[..line_start.saturating_sub(1)], line_end);
        }
        if line_end == rest.len() {
            return Err(DocketError::UserError(
                "missing closing '---' frontmatter delimiter".to_string(),
            ));
        }
        line_start = line_end + 1;
    };

    let body_start = original_offset(content, first_newline + 1 + closing_len);
    let remaining = &content[body_start..];
    let body = remaining
        .strip_prefix("\r\n")
        .or_else(|| remaining.strip_prefix('\n'))
        .unwrap_or(remaining);

    Ok((yaml.to_string(), body.to_string()))
}

/// A line consisting of `---` alone (trailing whitespace allowed).
fn is_delimiter(line: &str) -> bool {
    line.trim_end() == "---"
}

/// Map an offset in the LF-normalized text back onto `original`.
fn original_offset(original: &str, normalized_pos: usize) -> usize {
    let bytes = original.as_bytes();
    let (mut orig, mut norm) = (0, 0);

    while norm < normalized_pos && orig < bytes.len() {
        if bytes[orig] == b'\r' && bytes.get(orig + 1) == Some(&b'\n') {
            orig += 2;
        } else {
            orig += 1;
        }
        norm += 1;
    }
    orig
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Header {
        #[serde(rename = "ID")]
        id: String,
    }

    #[test]
    fn parses_header_and_body() {
        let doc: Document<Header> = Document::parse("---\nID: A-1\n---\n\nHello\n").unwrap();
        assert_eq!(doc.frontmatter.id, "A-1");
        assert_eq!(doc.body, "\nHello\n");
    }

    #[test]
    fn preserves_crlf_body() {
        let doc: Document<Header> =
            Document::parse("---\r\nID: A-1\r\n---\r\nline one\r\nline two\r\n").unwrap();
        assert_eq!(doc.body, "line one\r\nline two\r\n");
    }

    #[test]
    fn body_may_be_empty() {
        let doc: Document<Header> = Document::parse("---\nID: A-1\n---").unwrap();
        assert_eq!(doc.body, "");
    }

    #[test]
    fn render_round_trips_body() {
        let doc = Document {
            frontmatter: Header {
                id: "A-2".to_string(),
            },
            body: "\n## Notes\nkeep me  \n".to_string(),
        };
        let reparsed: Document<Header> = Document::parse(&doc.render().unwrap()).unwrap();
        assert_eq!(reparsed, doc);
    }

    #[test]
    fn rejects_missing_delimiters() {
        assert!(split_frontmatter("ID: A-1\n").is_err());
        assert!(split_frontmatter("---\nID: A-1\n").is_err());
        assert!(split_frontmatter("---").is_err());
    }

    #[test]
    fn delimiter_must_be_a_whole_line() {
        let (yaml, body) =
            split_frontmatter("---\nID: A-1\n----\nNote: ---x\n---x\n---\nbody\n").unwrap();
        assert_eq!(yaml, "ID: A-1\n----\nNote: ---x\n---x");
        assert_eq!(body, "body\n");

        assert!(split_frontmatter("----\nID: A-1\n---\n").is_err());
        assert!(split_frontmatter("---\nID: A-1\n---x\n").is_err());
    }

    #[test]
    fn empty_header_is_allowed() {
        let (yaml, body) = split_frontmatter("---\n---\nbody").unwrap();
        assert_eq!(yaml, "");
        assert_eq!(body, "body");
    }
}
