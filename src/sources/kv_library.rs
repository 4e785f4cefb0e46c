//! Scanner for a key/value-format game library.
//!
//! Layout, as the launcher that owns it writes it:
//!
//! ```text
//! <library>/manifests/*.kv   one app manifest per installed game
//! <library>/common/<dir>/    the game files themselves
//! <library>/owned.kv         owned-but-not-installed entries (optional)
//! ```
//!
//! App manifests never carry a launch command, so the executable is picked
//! heuristically from the install directory. The owned list, when present,
//! forms a second pass for the same platform; the refresh orchestrator
//! unions both before diffing.

use std::fs;
use std::path::PathBuf;

use tracing::warn;

use crate::error::Result;
use crate::game::{GameRecord, PlatformTag};
use crate::kvtext::{self, KvNode};
use crate::matcher::{self, DescriptionReader, NoDescriptions};
use crate::sources::{GameSource, ScanPass};
use crate::icons;

pub struct KvLibrarySource {
    platform: PlatformTag,
    library_dir: PathBuf,
    reader: Box<dyn DescriptionReader + Send + Sync>,
}

impl KvLibrarySource {
    pub fn new(platform: PlatformTag, library_dir: impl Into<PathBuf>) -> Self {
        Self {
            platform,
            library_dir: library_dir.into(),
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

    /// Map one parsed app manifest to a record. The manifest's single
    /// top-level block carries the scalars; its name varies by vendor
    /// version and is not significant.
    fn record_from_manifest(&self, doc: &KvNode) -> Option<GameRecord> {
        let app = doc.children.values().next()?;
        let id = app.scalar("appid")?;
        let title = app.scalar("name")?;
        let mut record = GameRecord::new(self.platform.clone(), id, title);

        if let Some(install_dir) = app.scalar("installdir") {
            let dir = self.library_dir.join("common").join(install_dir);
            record.installed = dir.is_dir();
            if record.installed {
                if let Some(exe) =
                    matcher::find_primary_executable(&dir, &record.title, self.reader.as_ref())
                {
                    record.launch_command = exe.to_string_lossy().into_owned();
                }
                if let Some(icon) = icons::discover_local_icon(&dir, &record.title) {
                    record.icon_path = icon;
                }
            }
        }

        Some(record)
    }

    fn installed_pass(&self) -> Result<ScanPass> {
        let manifests = self.library_dir.join("manifests");
        let entries = fs::read_dir(&manifests)?;
        let mut records = Vec::new();
        let mut failures = 0usize;

        for entry in entries {
            let path = match entry {
                Ok(entry) => entry.path(),
                Err(e) => {
                    warn!(error = %e, "unreadable directory entry");
                    failures += 1;
                    continue;
                }
            };
            let is_manifest = path.is_file()
                && path
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("kv"));
            if !is_manifest {
                continue;
            }
            match kvtext::parse_file(&path) {
                Ok(doc) => match self.record_from_manifest(&doc) {
                    Some(record) => records.push(record),
                    None => {
                        warn!(manifest = %path.display(), "manifest lacks appid/name");
                        failures += 1;
                    }
                },
                Err(e) => {
                    warn!(manifest = %path.display(), error = %e, "discarding manifest");
                    failures += 1;
                }
            }
        }

        Ok(ScanPass {
            records,
            complete: failures == 0,
        })
    }

    /// Owned-but-not-installed entries: a single block of id/title scalars.
    fn owned_pass(&self) -> Option<ScanPass> {
        let path = self.library_dir.join("owned.kv");
        if !path.is_file() {
            return None;
        }
        match kvtext::parse_file(&path) {
            Ok(doc) => {
                let block = doc.children.values().next().unwrap_or(&doc);
                let records = block
                    .scalars
                    .iter()
                    .map(|(id, title)| GameRecord::new(self.platform.clone(), id, title))
                    .collect();
                Some(ScanPass::complete(records))
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "discarding owned list");
                Some(ScanPass::partial(Vec::new()))
            }
        }
    }
}

impl GameSource for KvLibrarySource {
    fn platform(&self) -> PlatformTag {
        self.platform.clone()
    }

    fn name(&self) -> &str {
        "kv-library"
    }

    fn scan(&self) -> Result<Vec<ScanPass>> {
        let mut passes = vec![self.installed_pass()?];
        if let Some(owned) = self.owned_pass() {
            passes.push(owned);
        }
        Ok(passes)
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use pretty_assertions::assert_eq;

    use super::*;

    fn library_with_game(root: &Path, id: &str, title: &str, installdir: &str) {
        fs::create_dir_all(root.join("manifests")).unwrap();
        let game_dir = root.join("common").join(installdir);
        fs::create_dir_all(&game_dir).unwrap();
        fs::write(game_dir.join(format!("{installdir}.exe")), b"bin").unwrap();
        fs::write(
            root.join("manifests").join(format!("app_{id}.kv")),
            format!(
                r#""AppState"
{{
    "appid"       "{id}"
    "name"        "{title}"
    "installdir"  "{installdir}"
}}"#
            ),
        )
        .unwrap();
    }

    #[test]
    fn installed_games_get_ids_titles_and_launch_commands() {
        let root = tempfile::tempdir().unwrap();
        library_with_game(root.path(), "440", "Team Fortress 2", "tf2");

        let source = KvLibrarySource::new(PlatformTag::new("kvshelf"), root.path());
        let passes = source.scan().unwrap();
        assert_eq!(passes.len(), 1);
        assert!(passes[0].complete);

        let record = &passes[0].records[0];
        assert_eq!(record.id, "440");
        assert_eq!(record.title, "Team Fortress 2");
        assert!(record.installed);
        assert!(record.launch_command.ends_with("tf2.exe"));
    }

    #[test]
    fn owned_list_becomes_a_second_pass() {
        let root = tempfile::tempdir().unwrap();
        library_with_game(root.path(), "440", "Team Fortress 2", "tf2");
        fs::write(
            root.path().join("owned.kv"),
            r#""owned"
{
    "440"   "Team Fortress 2"
    "70"    "Half-Life"
}"#,
        )
        .unwrap();

        let source = KvLibrarySource::new(PlatformTag::new("kvshelf"), root.path());
        let passes = source.scan().unwrap();
        assert_eq!(passes.len(), 2);
        assert!(passes[1].complete);

        let mut owned_ids: Vec<&str> =
            passes[1].records.iter().map(|r| r.id.as_str()).collect();
        owned_ids.sort();
        assert_eq!(owned_ids, vec!["440", "70"]);
        assert!(passes[1].records.iter().all(|r| !r.installed));
    }

    #[test]
    fn malformed_manifest_discards_the_document_and_marks_incomplete() {
        let root = tempfile::tempdir().unwrap();
        library_with_game(root.path(), "440", "Team Fortress 2", "tf2");
        fs::write(
            root.path().join("manifests").join("broken.kv"),
            r#""AppState" { "appid" "1""#,
        )
        .unwrap();

        let source = KvLibrarySource::new(PlatformTag::new("kvshelf"), root.path());
        let passes = source.scan().unwrap();
        assert_eq!(passes[0].records.len(), 1);
        assert!(!passes[0].complete);
    }

    #[test]
    fn manifest_for_a_vanished_install_dir_is_not_installed() {
        let root = tempfile::tempdir().unwrap();
        library_with_game(root.path(), "440", "Team Fortress 2", "tf2");
        fs::remove_dir_all(root.path().join("common")).unwrap();

        let source = KvLibrarySource::new(PlatformTag::new("kvshelf"), root.path());
        let passes = source.scan().unwrap();
        let record = &passes[0].records[0];
        assert!(!record.installed);
        assert!(record.launch_command.is_empty());
    }

    #[test]
    fn missing_manifest_dir_is_a_source_level_error() {
        let root = tempfile::tempdir().unwrap();
        let source = KvLibrarySource::new(PlatformTag::new("kvshelf"), root.path());
        assert!(source.scan().is_err());
    }
}
