//! Scanner for the user-authored flat config file.
//!
//! Line-oriented, `#` comments, one game per line:
//!
//! ```text
//! identifier|title|launch command[|install dir]
//! ```
//!
//! Everything here is user-authored, so records are flagged custom and are
//! never auto-removed by a rescan. A missing file simply means the user
//! has added nothing.

use std::fs;
use std::path::PathBuf;

use tracing::{debug, warn};

use crate::error::Result;
use crate::game::{GameRecord, PlatformTag};
use crate::icons;
use crate::sources::{GameSource, ScanPass};

pub struct FlatConfigSource {
    platform: PlatformTag,
    path: PathBuf,
}

impl FlatConfigSource {
    pub fn new(platform: PlatformTag, path: impl Into<PathBuf>) -> Self {
        Self {
            platform,
            path: path.into(),
        }
    }

    fn parse_line(&self, line: &str) -> Option<GameRecord> {
        let fields: Vec<&str> = line.split('|').map(str::trim).collect();
        if fields.len() < 3 || fields[0].is_empty() || fields[1].is_empty() {
            return None;
        }
        let mut record = GameRecord::new(self.platform.clone(), fields[0], fields[1]);
        record.launch_command = fields[2].to_string();
        record.installed = true;
        record.custom = true;
        if let Some(install_dir) = fields.get(3).copied() {
            let dir = PathBuf::from(install_dir);
            if let Some(icon) = icons::discover_local_icon(&dir, &record.title) {
                record.icon_path = icon;
            }
        }
        Some(record)
    }
}

impl GameSource for FlatConfigSource {
    fn platform(&self) -> PlatformTag {
        self.platform.clone()
    }

    fn name(&self) -> &str {
        "flat-config"
    }

    fn scan(&self) -> Result<Vec<ScanPass>> {
        if !self.path.is_file() {
            debug!(path = %self.path.display(), "no custom games file");
            return Ok(vec![ScanPass::complete(Vec::new())]);
        }

        let text = fs::read_to_string(&self.path)?;
        let mut records = Vec::new();
        for (number, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match self.parse_line(line) {
                Some(record) => records.push(record),
                None => {
                    warn!(path = %self.path.display(), line = number + 1, "skipping malformed line")
                }
            }
        }
        Ok(vec![ScanPass::complete(records)])
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn lines_become_custom_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.games");
        fs::write(
            &path,
            "# my additions\n\
             doom1 | Doom | dosbox -conf doom.conf\n\
             \n\
             broken line without pipes\n\
             ck3 | Crusader Kings III | /usr/bin/ck3\n",
        )
        .unwrap();

        let source = FlatConfigSource::new(PlatformTag::new("custom"), &path);
        let passes = source.scan().unwrap();
        assert_eq!(passes.len(), 1);
        assert!(passes[0].complete);

        let records = &passes[0].records;
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.custom && r.installed));
        let doom = records.iter().find(|r| r.id == "doom1").unwrap();
        assert_eq!(doom.title, "Doom");
        assert_eq!(doom.launch_command, "dosbox -conf doom.conf");
    }

    #[test]
    fn optional_install_dir_feeds_icon_discovery() {
        let games = tempfile::tempdir().unwrap();
        fs::write(games.path().join("logo.png"), b"png").unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.games");
        fs::write(
            &path,
            format!("g1 | Some Game | /bin/game | {}\n", games.path().display()),
        )
        .unwrap();

        let source = FlatConfigSource::new(PlatformTag::new("custom"), &path);
        let passes = source.scan().unwrap();
        assert!(passes[0].records[0].icon_path.ends_with("logo.png"));
    }

    #[test]
    fn missing_file_is_an_empty_complete_pass() {
        let dir = tempfile::tempdir().unwrap();
        let source =
            FlatConfigSource::new(PlatformTag::new("custom"), dir.path().join("none.games"));
        let passes = source.scan().unwrap();
        assert!(passes[0].records.is_empty());
        assert!(passes[0].complete);
    }
}
