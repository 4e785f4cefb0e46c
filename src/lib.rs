//! Gameshelf Core Library
//!
//! Multi-source game discovery and reconciliation engine. Scans the
//! install metadata that launchers leave behind on a machine (JSON
//! manifest directories, brace-format key/value libraries, vendor SQLite
//! catalogs, flat config files, and on Windows the registry), normalizes
//! everything into canonical records and merges them into a persistent
//! catalog without clobbering user state.
//!
//! # Architecture
//!
//! This library is the engine behind thin frontends; rendering, process
//! launching and artwork downloading stay outside.
//!
//! ## Discovery (`search`, `kvtext`, `node`, `sources` modules)
//! - [`search::find_by_value_match`] - pruned tree search over any
//!   hierarchical store
//! - [`kvtext::parse_document`] - parser for the custom key/value grammar
//! - One [`node::SourceNode`] abstraction so the same predicates walk a
//!   directory tree, a JSON document, a parsed manifest or the registry
//!
//! ## Launch heuristics (`matcher`, `icons` modules)
//! - [`matcher::find_primary_executable`] - best-guess executable for an
//!   install directory when no source records a launch command
//! - [`icons`] - artwork cache slots and local icon discovery
//!
//! ## Catalog (`reconcile`, `store`, `refresh` modules)
//! - [`reconcile::reconcile_scan`] - diff a fresh scan against the
//!   catalog; additions get default flags, removals require a complete
//!   scan, user state survives by identity
//! - [`refresh::Library`] - caller-facing operations: rescan a platform,
//!   toggle favourite/hidden, record a launch

pub mod error;
pub mod game;
pub mod icons;
pub mod kvtext;
pub mod matcher;
pub mod node;
pub mod reconcile;
pub mod refresh;
pub mod search;
pub mod sources;
pub mod store;

pub use error::{Error, Result};
pub use game::{GameId, GameRecord, PlatformTag};
pub use reconcile::{reconcile_scan, union_passes, Catalog, PlatformViews, ScanDelta};
pub use refresh::Library;
pub use sources::{GameSource, ScanPass};
pub use store::{CatalogStore, MemoryStore, SqliteStore};
