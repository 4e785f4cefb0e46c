//! Catalog state and the scan reconciliation algorithm.
//!
//! The catalog is an explicit object keyed by `(platform, identifier)`;
//! titles collide across platforms and must never merge records. A rescan
//! is reconciled as a diff: new identifiers are added with default user
//! flags, vanished identifiers are removed only when a *complete* scan
//! positively confirms the absence, and records present on both sides keep
//! their user state by identity. A partial or errored scan can add but
//! never destroy.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::Utc;
use tracing::debug;

use crate::error::{Error, Result};
use crate::game::{GameId, GameRecord, PlatformTag};
use crate::sources::ScanPass;

/// Frequency added to a record on launch.
pub const LAUNCH_BOOST: f64 = 1.0;
/// Factor applied to every other record of the platform on each launch, so
/// the ordering favours recent play without a hard ceiling.
pub const DECAY_FACTOR: f64 = 0.975;

/// Derived per-platform orderings, recomputed after each mutation so
/// index-based lookups stay valid until the next mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlatformViews {
    /// Every identifier of the platform, ordered by title then identifier.
    pub all: Vec<GameId>,
    /// Favourites only, same ordering.
    pub favourites: Vec<GameId>,
}

/// What a reconciled scan changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanDelta {
    pub added: Vec<GameRecord>,
    pub removed: Vec<GameRecord>,
}

impl ScanDelta {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// In-memory catalog of game records, keyed by `(platform, identifier)`.
#[derive(Debug, Default)]
pub struct Catalog {
    records: HashMap<PlatformTag, BTreeMap<GameId, GameRecord>>,
    views: HashMap<PlatformTag, PlatformViews>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, platform: &PlatformTag, id: &str) -> Option<&GameRecord> {
        self.records.get(platform)?.get(id)
    }

    /// Records of one platform, in identifier order.
    pub fn platform_records(&self, platform: &PlatformTag) -> Vec<&GameRecord> {
        self.records
            .get(platform)
            .map(|m| m.values().collect())
            .unwrap_or_default()
    }

    pub fn platforms(&self) -> Vec<&PlatformTag> {
        self.records.keys().collect()
    }

    /// Derived views for one platform.
    pub fn views(&self, platform: &PlatformTag) -> PlatformViews {
        self.views.get(platform).cloned().unwrap_or_default()
    }

    /// Insert a record loaded from the persistent store, keeping its flags.
    pub fn restore(&mut self, record: GameRecord) {
        let platform = record.platform.clone();
        self.records
            .entry(platform.clone())
            .or_default()
            .insert(record.id.clone(), record);
        self.rebuild_views(&platform);
    }

    /// Apply a reconciled delta and refresh the source-owned fields of the
    /// records that survived. User flags are untouched throughout.
    pub fn absorb(&mut self, platform: &PlatformTag, fresh: Vec<GameRecord>, delta: &ScanDelta) {
        let removed: HashSet<&str> = delta.removed.iter().map(|r| r.id.as_str()).collect();
        let platform_records = self.records.entry(platform.clone()).or_default();

        for id in removed {
            platform_records.remove(id);
        }

        for incoming in fresh {
            match platform_records.get_mut(&incoming.id) {
                Some(existing) => {
                    // Source-owned fields follow the scan; user state stays.
                    existing.title = incoming.title;
                    existing.alias = incoming.alias;
                    existing.installed = incoming.installed;
                    existing.launch_command = incoming.launch_command;
                    existing.uninstall_command = incoming.uninstall_command;
                    if !incoming.icon_path.is_empty() {
                        existing.icon_path = incoming.icon_path;
                    }
                }
                None => {
                    let record = incoming.with_default_flags();
                    platform_records.insert(record.id.clone(), record);
                }
            }
        }

        self.rebuild_views(platform);
    }

    fn record_mut(&mut self, platform: &PlatformTag, id: &str) -> Result<&mut GameRecord> {
        self.records
            .get_mut(platform)
            .and_then(|m| m.get_mut(id))
            .ok_or_else(|| Error::UnknownGame {
                platform: platform.clone(),
                id: id.to_string(),
            })
    }

    /// Flip the favourite flag; returns the new value.
    pub fn toggle_favourite(&mut self, platform: &PlatformTag, id: &str) -> Result<bool> {
        let record = self.record_mut(platform, id)?;
        record.favourite = !record.favourite;
        let value = record.favourite;
        self.rebuild_views(platform);
        Ok(value)
    }

    /// Flip the hidden flag; returns the new value.
    pub fn toggle_hidden(&mut self, platform: &PlatformTag, id: &str) -> Result<bool> {
        let record = self.record_mut(platform, id)?;
        record.hidden = !record.hidden;
        let value = record.hidden;
        self.rebuild_views(platform);
        Ok(value)
    }

    /// Leaky-bucket play frequency: a launch boosts the launched record and
    /// decays every other record of the platform, so the ordering tracks
    /// recency and frequency together. Returns the record's new frequency.
    /// A non-launch update leaves frequencies unchanged.
    pub fn update_frequency(
        &mut self,
        platform: &PlatformTag,
        id: &str,
        is_launch: bool,
    ) -> Result<f64> {
        if !is_launch {
            return Ok(self
                .get(platform, id)
                .ok_or_else(|| Error::UnknownGame {
                    platform: platform.clone(),
                    id: id.to_string(),
                })?
                .frequency);
        }

        let platform_records =
            self.records
                .get_mut(platform)
                .ok_or_else(|| Error::UnknownGame {
                    platform: platform.clone(),
                    id: id.to_string(),
                })?;
        if !platform_records.contains_key(id) {
            return Err(Error::UnknownGame {
                platform: platform.clone(),
                id: id.to_string(),
            });
        }

        let mut updated = 0.0;
        for record in platform_records.values_mut() {
            if record.id == id {
                record.frequency += LAUNCH_BOOST;
                record.last_played = Some(Utc::now());
                updated = record.frequency;
            } else {
                record.frequency *= DECAY_FACTOR;
            }
        }
        Ok(updated)
    }

    fn rebuild_views(&mut self, platform: &PlatformTag) {
        let Some(platform_records) = self.records.get(platform) else {
            self.views.remove(platform);
            return;
        };
        let mut ordered: Vec<&GameRecord> = platform_records.values().collect();
        ordered.sort_by(|a, b| {
            (a.title.to_lowercase(), &a.id).cmp(&(b.title.to_lowercase(), &b.id))
        });

        let views = PlatformViews {
            all: ordered.iter().map(|r| r.id.clone()).collect(),
            favourites: ordered
                .iter()
                .filter(|r| r.favourite)
                .map(|r| r.id.clone())
                .collect(),
        };
        self.views.insert(platform.clone(), views);
    }
}

/// Diff a fresh scan against the catalog. Pure: the catalog is not touched;
/// apply the delta with [`Catalog::absorb`].
///
/// Additions are fresh identifiers unknown to the catalog, normalized to
/// default user flags. Removals are catalog identifiers missing from the
/// scan, but only when the scan was complete (a partial scan proves
/// nothing) and never for custom records.
pub fn reconcile_scan(
    catalog: &Catalog,
    platform: &PlatformTag,
    fresh: &[GameRecord],
    is_complete_source_scan: bool,
) -> ScanDelta {
    let known: HashSet<&str> = catalog
        .platform_records(platform)
        .iter()
        .map(|r| r.id.as_str())
        .collect();
    let seen: HashSet<&str> = fresh.iter().map(|r| r.id.as_str()).collect();

    let added = fresh
        .iter()
        .filter(|r| !known.contains(r.id.as_str()))
        .map(|r| r.clone().with_default_flags())
        .collect();

    let removed = if is_complete_source_scan {
        catalog
            .platform_records(platform)
            .into_iter()
            .filter(|r| !seen.contains(r.id.as_str()) && !r.custom)
            .cloned()
            .collect()
    } else {
        Vec::new()
    };

    ScanDelta { added, removed }
}

/// Union several scan passes of one platform into a single fresh-record
/// set, merging by identifier. Diffing passes independently against the
/// catalog makes each pass's absences look like removals and the records
/// flap in and out; the union sees a game that is installed in one pass
/// and owned in another as one present game.
pub fn union_passes(passes: Vec<ScanPass>) -> (Vec<GameRecord>, bool) {
    let complete = !passes.is_empty() && passes.iter().all(|p| p.complete);
    let mut merged: BTreeMap<GameId, GameRecord> = BTreeMap::new();

    for pass in passes {
        for record in pass.records {
            match merged.get_mut(&record.id) {
                None => {
                    merged.insert(record.id.clone(), record);
                }
                Some(existing) => {
                    existing.installed |= record.installed;
                    if existing.launch_command.is_empty() {
                        existing.launch_command = record.launch_command;
                    }
                    if existing.uninstall_command.is_empty() {
                        existing.uninstall_command = record.uninstall_command;
                    }
                    if existing.icon_path.is_empty() {
                        existing.icon_path = record.icon_path;
                    }
                    existing.tags.extend(record.tags);
                    debug!(id = %existing.id, "merged duplicate record across passes");
                }
            }
        }
    }

    (merged.into_values().collect(), complete)
}
