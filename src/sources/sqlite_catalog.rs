//! Scanner for a vendor SQLite catalog.
//!
//! The database is externally owned and opened read-only. Expected shape:
//! a `games` table (`id`, `title`, `icon`) listing everything the account
//! owns, and an `installs` table (`game_id`, `install_dir`,
//! `launch_command`) for what is actually on disk. The adapter produces
//! two passes, owned and installed, which the refresh orchestrator
//! unions before diffing.

use std::path::{Path, PathBuf};

use rusqlite::{Connection, OpenFlags};
use tracing::warn;

use crate::error::Result;
use crate::game::{GameRecord, PlatformTag};
use crate::matcher::{self, DescriptionReader, NoDescriptions};
use crate::sources::{GameSource, ScanPass};

pub struct SqliteCatalogSource {
    platform: PlatformTag,
    db_path: PathBuf,
    reader: Box<dyn DescriptionReader + Send + Sync>,
}

impl SqliteCatalogSource {
    pub fn new(platform: PlatformTag, db_path: impl Into<PathBuf>) -> Self {
        Self {
            platform,
            db_path: db_path.into(),
            reader: Box::new(NoDescriptions),
        }
    }

    pub fn with_description_reader(
        mut self,
        reader: Box<dyn DescriptionReader + Send + Sync>,
    ) -> Self {
        self.reader = reader;
        self
    }

    fn owned_pass(&self, conn: &Connection) -> Result<ScanPass> {
        let mut stmt = conn.prepare(
            "select cast(id as text), title, coalesce(icon, '') from games",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, title, icon) = row?;
            let mut record = GameRecord::new(self.platform.clone(), id, title);
            record.icon_path = icon;
            records.push(record);
        }
        Ok(ScanPass::complete(records))
    }

    fn installed_pass(&self, conn: &Connection) -> Result<ScanPass> {
        let mut stmt = conn.prepare(
            "select cast(g.id as text), g.title, coalesce(g.icon, ''),
                    coalesce(i.install_dir, ''), coalesce(i.launch_command, '')
               from games g
               join installs i on i.game_id = g.id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, title, icon, install_dir, launch_command) = row?;
            let mut record = GameRecord::new(self.platform.clone(), id, title);
            record.icon_path = icon;
            record.installed = true;
            record.launch_command = launch_command;
            if record.launch_command.is_empty() && !install_dir.is_empty() {
                let dir = Path::new(&install_dir);
                if let Some(exe) =
                    matcher::find_primary_executable(dir, &record.title, self.reader.as_ref())
                {
                    record.launch_command = exe.to_string_lossy().into_owned();
                }
            }
            records.push(record);
        }
        Ok(ScanPass::complete(records))
    }
}

impl GameSource for SqliteCatalogSource {
    fn platform(&self) -> PlatformTag {
        self.platform.clone()
    }

    fn name(&self) -> &str {
        "sqlite-catalog"
    }

    fn scan(&self) -> Result<Vec<ScanPass>> {
        let conn = Connection::open_with_flags(
            &self.db_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        let owned = self.owned_pass(&conn)?;
        let installed = match self.installed_pass(&conn) {
            Ok(pass) => pass,
            Err(e) => {
                // Older catalogs ship without an installs table; the owned
                // pass alone still counts, but cannot vouch for installs.
                warn!(db = %self.db_path.display(), error = %e, "no installed-games view");
                ScanPass::partial(Vec::new())
            }
        };
        Ok(vec![owned, installed])
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn vendor_db(path: &Path) -> Connection {
        let conn = Connection::open(path).unwrap();
        conn.execute_batch(
            "create table games (id integer primary key, title text not null, icon text);
             create table installs (game_id integer not null, install_dir text, launch_command text);",
        )
        .unwrap();
        conn
    }

    #[test]
    fn owned_and_installed_rows_become_two_passes() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("catalog.db");
        let conn = vendor_db(&db_path);
        conn.execute_batch(
            "insert into games values (1, 'Alpha', 'https://cdn/a.png');
             insert into games values (2, 'Beta', null);
             insert into installs values (1, '/games/alpha', '/games/alpha/run');",
        )
        .unwrap();
        drop(conn);

        let source = SqliteCatalogSource::new(PlatformTag::new("vendor"), &db_path);
        let passes = source.scan().unwrap();
        assert_eq!(passes.len(), 2);

        let owned = &passes[0];
        assert!(owned.complete);
        assert_eq!(owned.records.len(), 2);
        assert!(owned.records.iter().all(|r| !r.installed));
        assert_eq!(
            owned.records.iter().find(|r| r.id == "1").unwrap().icon_path,
            "https://cdn/a.png"
        );

        let installed = &passes[1];
        assert!(installed.complete);
        assert_eq!(installed.records.len(), 1);
        assert_eq!(installed.records[0].id, "1");
        assert!(installed.records[0].installed);
        assert_eq!(installed.records[0].launch_command, "/games/alpha/run");
    }

    #[test]
    fn missing_installs_table_degrades_to_an_incomplete_pass() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("catalog.db");
        let conn = Connection::open(&db_path).unwrap();
        conn.execute_batch(
            "create table games (id integer primary key, title text not null, icon text);
             insert into games values (1, 'Alpha', null);",
        )
        .unwrap();
        drop(conn);

        let source = SqliteCatalogSource::new(PlatformTag::new("vendor"), &db_path);
        let passes = source.scan().unwrap();
        assert_eq!(passes.len(), 2);
        assert!(passes[0].complete);
        assert_eq!(passes[0].records.len(), 1);
        assert!(!passes[1].complete);
        assert!(passes[1].records.is_empty());
    }

    #[test]
    fn unreadable_database_is_a_source_level_error() {
        let source =
            SqliteCatalogSource::new(PlatformTag::new("vendor"), "/nonexistent/catalog.db");
        assert!(source.scan().is_err());
    }
}
