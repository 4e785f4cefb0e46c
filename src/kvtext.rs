//! Parser for the brace-delimited key/value manifest format.
//!
//! Several scanned launchers serialize their app manifests in the same
//! home-grown grammar: a document is a sequence of entries, an entry is
//! either a quoted key followed by a quoted value, or a quoted key followed
//! by a `{ ... }` block of nested entries. Whitespace between tokens is
//! insignificant and quoted strings end at the next unescaped quote.
//!
//! Duplicate and trailing keys are tolerated (sloppy vendor files are the
//! norm); only malformed structure (an unbalanced brace, a truncated
//! quoted token) is an error, and then the whole document is rejected.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::error::{Error, Result};

/// One parsed block: scalar entries plus named child blocks.
///
/// Sibling blocks sharing a name collapse to one entry, last-write-wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KvNode {
    pub scalars: BTreeMap<String, String>,
    pub children: BTreeMap<String, KvNode>,
}

impl KvNode {
    /// Scalar value by key, if present.
    pub fn scalar(&self, key: &str) -> Option<&str> {
        self.scalars.get(key).map(String::as_str)
    }

    /// Child block by name, if present.
    pub fn child(&self, name: &str) -> Option<&KvNode> {
        self.children.get(name)
    }
}

/// Structural parse failure, with the absolute byte offset of the offending
/// token.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason} at byte {offset}")]
pub struct KvError {
    pub reason: String,
    pub offset: usize,
}

impl KvError {
    fn new(reason: impl Into<String>, offset: usize) -> Self {
        Self {
            reason: reason.into(),
            offset,
        }
    }
}

/// Parse a whole document into its root node.
pub fn parse_document(text: &str) -> std::result::Result<KvNode, KvError> {
    parse_entries(text, 0)
}

/// Parse a document from disk, folding structural failures into
/// [`Error::MalformedDocument`] so callers can discard the file as zero
/// records.
pub fn parse_file(path: &Path) -> Result<KvNode> {
    let text = fs::read_to_string(path)?;
    parse_document(&text).map_err(|e| Error::MalformedDocument {
        path: path.to_path_buf(),
        reason: e.reason,
        offset: e.offset,
    })
}

/// Parse the entries of one block. `base` is the byte offset of `text`
/// within the original document, so errors report absolute positions.
fn parse_entries(text: &str, base: usize) -> std::result::Result<KvNode, KvError> {
    let bytes = text.as_bytes();
    let mut node = KvNode::default();
    let mut pos = 0;

    while let Some(key_start) = find_byte(bytes, pos, |b| b == b'"') {
        let (key, after_key) = read_quoted(bytes, key_start, base)?;

        // Whichever comes first after the key, a quote or an opening brace,
        // decides between a scalar entry and a block entry. A key with
        // neither is a tolerated trailing key.
        let Some(token_at) = find_byte(bytes, after_key, |b| b == b'"' || b == b'{') else {
            break;
        };

        if bytes[token_at] == b'"' {
            let (value, after_value) = read_quoted(bytes, token_at, base)?;
            node.scalars.insert(key, value);
            pos = after_value;
        } else {
            let close = matching_brace(bytes, token_at).ok_or_else(|| {
                KvError::new("unbalanced block", base + token_at)
            })?;
            let inner = &text[token_at + 1..close];
            let child = parse_entries(inner, base + token_at + 1)?;
            node.children.insert(key, child);
            pos = close + 1;
        }
    }

    Ok(node)
}

/// First index at or after `from` whose byte satisfies the predicate.
fn find_byte(bytes: &[u8], from: usize, pred: impl Fn(u8) -> bool) -> Option<usize> {
    bytes
        .iter()
        .enumerate()
        .skip(from)
        .find(|(_, b)| pred(**b))
        .map(|(i, _)| i)
}

/// Read a quoted string starting at the opening quote `open`. Returns the
/// unescaped content and the index just past the closing quote.
fn read_quoted(
    bytes: &[u8],
    open: usize,
    base: usize,
) -> std::result::Result<(String, usize), KvError> {
    let mut out = Vec::new();
    let mut i = open + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'"' => {
                let text = String::from_utf8_lossy(&out).into_owned();
                return Ok((text, i + 1));
            }
            b'\\' if i + 1 < bytes.len() && matches!(bytes[i + 1], b'"' | b'\\') => {
                out.push(bytes[i + 1]);
                i += 2;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    Err(KvError::new("unterminated quoted string", base + open))
}

/// Index of the brace matching the one at `open`, found by depth counting.
/// `None` when end-of-input is reached first.
fn matching_brace(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, b) in bytes.iter().enumerate().skip(open) {
        match b {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}
