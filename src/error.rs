//! Error types shared across the library.
//!
//! Source adapters are expected to catch failures at the smallest possible
//! scope and degrade to "source absent"; the variants here cover what is
//! left once that has happened.

use std::path::PathBuf;

use thiserror::Error;

use crate::game::PlatformTag;

#[derive(Error, Debug)]
pub enum Error {
    /// Structurally invalid document in the custom key/value format. The
    /// whole document is discarded; partial trees are never returned.
    #[error("malformed document {path:?}: {reason} at byte {offset}")]
    MalformedDocument {
        path: PathBuf,
        reason: String,
        offset: usize,
    },
    #[error("node access failed: {0}")]
    Node(String),
    #[error("store error: {0}")]
    Store(String),
    #[error("manifest error: {0}")]
    Manifest(String),
    #[error("environment error: {0}")]
    Environment(String),
    #[error("unknown game {platform}/{id}")]
    UnknownGame { platform: PlatformTag, id: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Self::Store(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Manifest(e.to_string())
    }
}
