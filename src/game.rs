use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable, source-specific identifier for a game. Never derived from the
/// display title; titles collide, identifiers must not.
pub type GameId = String;

/// Tag identifying which platform (source family) a record belongs to.
///
/// Records are keyed by `(PlatformTag, GameId)` throughout the library, so
/// the same identifier appearing on two platforms stays two records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlatformTag(String);

impl PlatformTag {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlatformTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlatformTag {
    fn from(tag: &str) -> Self {
        Self(tag.to_string())
    }
}

/// Canonical record for one discovered game.
///
/// Sources own the descriptive fields (title, commands, icon, installed);
/// the user owns the flags (favourite, hidden, frequency, tags, rating). A
/// rescan may refresh the former but must never overwrite the latter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    pub id: GameId,
    pub title: String,
    /// Acronym derived from the title, used for fuzzy executable matching.
    /// Empty when the title yields none.
    pub alias: String,
    pub launch_command: String,
    pub uninstall_command: String,
    pub icon_path: String,
    pub platform: PlatformTag,
    pub installed: bool,
    pub favourite: bool,
    pub hidden: bool,
    pub frequency: f64,
    pub tags: BTreeSet<String>,
    pub last_played: Option<DateTime<Utc>>,
    pub rating: Option<f32>,
    /// User-authored records are exempt from automatic removal.
    pub custom: bool,
}

impl GameRecord {
    /// Create a record with default user flags, as a fresh scan surfaces it.
    pub fn new(platform: PlatformTag, id: impl Into<GameId>, title: impl Into<String>) -> Self {
        let title = title.into();
        let alias = crate::matcher::acronym(&title);
        Self {
            id: id.into(),
            title,
            alias,
            launch_command: String::new(),
            uninstall_command: String::new(),
            icon_path: String::new(),
            platform,
            installed: false,
            favourite: false,
            hidden: false,
            frequency: 0.0,
            tags: BTreeSet::new(),
            last_played: None,
            rating: None,
            custom: false,
        }
    }

    /// Strip user state back to defaults. Applied to freshly scanned records
    /// before they are added, so a source can never smuggle in flags.
    pub fn with_default_flags(mut self) -> Self {
        self.favourite = false;
        self.hidden = false;
        self.frequency = 0.0;
        self.last_played = None;
        self.rating = None;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_record_has_default_flags() {
        let rec = GameRecord::new(PlatformTag::new("pc"), "g1", "Some Game");
        assert!(!rec.favourite);
        assert!(!rec.hidden);
        assert_eq!(rec.frequency, 0.0);
        assert!(rec.tags.is_empty());
        assert!(!rec.custom);
    }

    #[test]
    fn alias_is_derived_from_title() {
        let rec = GameRecord::new(PlatformTag::new("pc"), "g1", "Grand Theft Auto V");
        assert_eq!(rec.alias, "GTAV");
    }

    #[test]
    fn default_flags_strip_user_state() {
        let mut rec = GameRecord::new(PlatformTag::new("pc"), "g1", "Some Game");
        rec.favourite = true;
        rec.hidden = true;
        rec.frequency = 4.0;
        let rec = rec.with_default_flags();
        assert!(!rec.favourite);
        assert!(!rec.hidden);
        assert_eq!(rec.frequency, 0.0);
    }
}
