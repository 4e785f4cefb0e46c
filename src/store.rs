//! Persistent catalog stores.
//!
//! The engine consumes the store as a simple keyed record interface; it
//! does not care how records are kept. Two reference implementations are
//! provided: an in-memory map for tests and embedders with their own
//! persistence, and a SQLite store keyed by `(platform, identifier)`.

use std::collections::BTreeSet;
use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use crate::error::{Error, Result};
use crate::game::{GameId, GameRecord, PlatformTag};

/// Keyed record store the catalog persists into.
pub trait CatalogStore: Send {
    /// All stored records of one platform.
    fn load(&mut self, platform: &PlatformTag) -> Result<Vec<GameRecord>>;

    /// Insert or replace one record.
    fn insert(&mut self, record: &GameRecord) -> Result<()>;

    /// Remove one record.
    fn delete(&mut self, platform: &PlatformTag, id: &str) -> Result<()>;

    /// Update the user flags of one record, touching only the given ones.
    fn update_flags(
        &mut self,
        platform: &PlatformTag,
        id: &str,
        favourite: Option<bool>,
        hidden: Option<bool>,
        frequency: Option<f64>,
    ) -> Result<()>;
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: HashMap<(PlatformTag, GameId), GameRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CatalogStore for MemoryStore {
    fn load(&mut self, platform: &PlatformTag) -> Result<Vec<GameRecord>> {
        let mut records: Vec<GameRecord> = self
            .records
            .values()
            .filter(|r| &r.platform == platform)
            .cloned()
            .collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(records)
    }

    fn insert(&mut self, record: &GameRecord) -> Result<()> {
        self.records.insert(
            (record.platform.clone(), record.id.clone()),
            record.clone(),
        );
        Ok(())
    }

    fn delete(&mut self, platform: &PlatformTag, id: &str) -> Result<()> {
        self.records.remove(&(platform.clone(), id.to_string()));
        Ok(())
    }

    fn update_flags(
        &mut self,
        platform: &PlatformTag,
        id: &str,
        favourite: Option<bool>,
        hidden: Option<bool>,
        frequency: Option<f64>,
    ) -> Result<()> {
        let record = self
            .records
            .get_mut(&(platform.clone(), id.to_string()))
            .ok_or_else(|| Error::UnknownGame {
                platform: platform.clone(),
                id: id.to_string(),
            })?;
        if let Some(favourite) = favourite {
            record.favourite = favourite;
        }
        if let Some(hidden) = hidden {
            record.hidden = hidden;
        }
        if let Some(frequency) = frequency {
            record.frequency = frequency;
        }
        Ok(())
    }
}

/// SQLite-backed store. One row per record; tags are kept as a JSON array
/// column, timestamps as RFC 3339 text.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        Self::with_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "create table if not exists games (
                platform            text not null,
                id                  text not null,
                title               text not null,
                alias               text not null default '',
                launch_command      text not null default '',
                uninstall_command   text not null default '',
                icon_path           text not null default '',
                installed           integer not null default 0,
                favourite           integer not null default 0,
                hidden              integer not null default 0,
                frequency           real not null default 0,
                tags                text not null default '[]',
                last_played         text,
                rating              real,
                custom              integer not null default 0,
                primary key (platform, id)
            )",
        )?;
        Ok(Self { conn })
    }
}

impl CatalogStore for SqliteStore {
    fn load(&mut self, platform: &PlatformTag) -> Result<Vec<GameRecord>> {
        let mut stmt = self.conn.prepare_cached(
            "select id, title, alias, launch_command, uninstall_command, icon_path,
                    installed, favourite, hidden, frequency, tags, last_played,
                    rating, custom
               from games where platform = ? order by id",
        )?;
        let rows = stmt.query_map(params![platform.as_str()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, bool>(6)?,
                row.get::<_, bool>(7)?,
                row.get::<_, bool>(8)?,
                row.get::<_, f64>(9)?,
                row.get::<_, String>(10)?,
                row.get::<_, Option<String>>(11)?,
                row.get::<_, Option<f64>>(12)?,
                row.get::<_, bool>(13)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (
                id,
                title,
                alias,
                launch_command,
                uninstall_command,
                icon_path,
                installed,
                favourite,
                hidden,
                frequency,
                tags,
                last_played,
                rating,
                custom,
            ) = row?;
            let tags: BTreeSet<String> = serde_json::from_str(&tags)
                .map_err(|e| Error::Store(format!("tags column: {e}")))?;
            let last_played = match last_played {
                Some(text) => Some(
                    DateTime::parse_from_rfc3339(&text)
                        .map_err(|e| Error::Store(format!("last_played column: {e}")))?
                        .with_timezone(&Utc),
                ),
                None => None,
            };
            records.push(GameRecord {
                id,
                title,
                alias,
                launch_command,
                uninstall_command,
                icon_path,
                platform: platform.clone(),
                installed,
                favourite,
                hidden,
                frequency,
                tags,
                last_played,
                rating: rating.map(|r| r as f32),
                custom,
            });
        }
        Ok(records)
    }

    fn insert(&mut self, record: &GameRecord) -> Result<()> {
        let tags = serde_json::to_string(&record.tags)?;
        let mut stmt = self.conn.prepare_cached(
            "insert or replace into games
                (platform, id, title, alias, launch_command, uninstall_command,
                 icon_path, installed, favourite, hidden, frequency, tags,
                 last_played, rating, custom)
             values (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )?;
        stmt.execute(params![
            record.platform.as_str(),
            record.id,
            record.title,
            record.alias,
            record.launch_command,
            record.uninstall_command,
            record.icon_path,
            record.installed,
            record.favourite,
            record.hidden,
            record.frequency,
            tags,
            record.last_played.map(|t| t.to_rfc3339()),
            record.rating.map(f64::from),
            record.custom,
        ])?;
        Ok(())
    }

    fn delete(&mut self, platform: &PlatformTag, id: &str) -> Result<()> {
        let mut stmt = self
            .conn
            .prepare_cached("delete from games where platform = ? and id = ?")?;
        stmt.execute(params![platform.as_str(), id])?;
        Ok(())
    }

    fn update_flags(
        &mut self,
        platform: &PlatformTag,
        id: &str,
        favourite: Option<bool>,
        hidden: Option<bool>,
        frequency: Option<f64>,
    ) -> Result<()> {
        let mut stmt = self.conn.prepare_cached(
            "update games
                set favourite = coalesce(?, favourite),
                    hidden    = coalesce(?, hidden),
                    frequency = coalesce(?, frequency)
              where platform = ? and id = ?",
        )?;
        let changed = stmt.execute(params![
            favourite,
            hidden,
            frequency,
            platform.as_str(),
            id
        ])?;
        if changed == 0 {
            return Err(Error::UnknownGame {
                platform: platform.clone(),
                id: id.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn sample_record() -> GameRecord {
        let mut record = GameRecord::new(PlatformTag::new("pc"), "g1", "Alpha");
        record.launch_command = "/games/alpha/run".into();
        record.installed = true;
        record.tags.insert("rpg".into());
        record.tags.insert("indie".into());
        record.last_played = Some(Utc::now());
        record.rating = Some(4.5);
        record
    }

    fn stores() -> Vec<Box<dyn CatalogStore>> {
        vec![
            Box::new(MemoryStore::new()),
            Box::new(SqliteStore::open_in_memory().unwrap()),
        ]
    }

    #[test]
    fn records_round_trip_with_tags_and_flags() {
        for mut store in stores() {
            let record = sample_record();
            store.insert(&record).unwrap();

            let loaded = store.load(&PlatformTag::new("pc")).unwrap();
            assert_eq!(loaded.len(), 1);
            assert_eq!(loaded[0].id, record.id);
            assert_eq!(loaded[0].tags, record.tags);
            assert_eq!(loaded[0].rating, record.rating);
            assert_eq!(
                loaded[0].last_played.map(|t| t.timestamp()),
                record.last_played.map(|t| t.timestamp())
            );
        }
    }

    #[test]
    fn load_is_scoped_to_the_platform() {
        for mut store in stores() {
            store.insert(&sample_record()).unwrap();
            let other = GameRecord::new(PlatformTag::new("other"), "g1", "Alpha");
            store.insert(&other).unwrap();

            assert_eq!(store.load(&PlatformTag::new("pc")).unwrap().len(), 1);
            assert_eq!(store.load(&PlatformTag::new("other")).unwrap().len(), 1);
            assert!(store.load(&PlatformTag::new("empty")).unwrap().is_empty());
        }
    }

    #[test]
    fn flag_updates_touch_only_what_was_given() {
        for mut store in stores() {
            store.insert(&sample_record()).unwrap();
            let platform = PlatformTag::new("pc");

            store
                .update_flags(&platform, "g1", Some(true), None, None)
                .unwrap();
            store
                .update_flags(&platform, "g1", None, None, Some(2.5))
                .unwrap();

            let loaded = store.load(&platform).unwrap();
            assert!(loaded[0].favourite);
            assert!(!loaded[0].hidden);
            assert_eq!(loaded[0].frequency, 2.5);
        }
    }

    #[test]
    fn updating_an_unknown_record_fails() {
        for mut store in stores() {
            let result =
                store.update_flags(&PlatformTag::new("pc"), "nope", Some(true), None, None);
            assert!(result.is_err());
        }
    }

    #[test]
    fn delete_removes_exactly_one_record() {
        for mut store in stores() {
            let platform = PlatformTag::new("pc");
            store.insert(&sample_record()).unwrap();
            let mut second = sample_record();
            second.id = "g2".into();
            store.insert(&second).unwrap();

            store.delete(&platform, "g1").unwrap();
            let loaded = store.load(&platform).unwrap();
            assert_eq!(loaded.len(), 1);
            assert_eq!(loaded[0].id, "g2");
        }
    }

    #[test]
    fn insert_is_an_upsert() {
        for mut store in stores() {
            let platform = PlatformTag::new("pc");
            store.insert(&sample_record()).unwrap();
            let mut updated = sample_record();
            updated.title = "Alpha Remastered".into();
            store.insert(&updated).unwrap();

            let loaded = store.load(&platform).unwrap();
            assert_eq!(loaded.len(), 1);
            assert_eq!(loaded[0].title, "Alpha Remastered");
        }
    }
}
