//! Scanner for a directory of per-game JSON manifests.
//!
//! Each manifest is one JSON document describing one game. The payload is
//! located through the unified node abstraction rather than a fixed
//! schema, because vendors nest the interesting object at different
//! depths; any node carrying a `gameId` field is the game entry.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::Result;
use crate::game::{GameRecord, PlatformTag};
use crate::matcher::{self, DescriptionReader, NoDescriptions};
use crate::node::JsonNode;
use crate::search::find_by_value_match;
use crate::sources::{GameSource, ScanPass};
use crate::{icons, Error};

pub struct JsonManifestSource {
    platform: PlatformTag,
    dir: PathBuf,
    reader: Box<dyn DescriptionReader + Send + Sync>,
}

impl JsonManifestSource {
    pub fn new(platform: PlatformTag, dir: impl Into<PathBuf>) -> Self {
        Self {
            platform,
            dir: dir.into(),
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

    fn read_manifest(&self, path: &Path) -> Result<GameRecord> {
        let text = fs::read_to_string(path)?;
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let root = JsonNode::parse(stem.clone(), &text)?;

        let hits = find_by_value_match(root, "gameId", "", &[]);
        let entry = hits.first().ok_or_else(|| {
            Error::Manifest(format!("{}: no node with a gameId field", path.display()))
        })?;

        let id = entry.get("gameId").unwrap_or_default();
        let title = entry.get("name").unwrap_or(&stem).to_string();
        let mut record = GameRecord::new(self.platform.clone(), id, title);
        record.launch_command = entry.get("launchCommand").unwrap_or_default().to_string();
        record.uninstall_command = entry
            .get("uninstallCommand")
            .unwrap_or_default()
            .to_string();
        record.icon_path = entry.get("icon").unwrap_or_default().to_string();

        if let Some(install_dir) = entry.get("installDirectory") {
            let install_dir = Path::new(install_dir);
            record.installed = install_dir.is_dir();
            if record.installed && record.launch_command.is_empty() {
                if let Some(exe) = matcher::find_primary_executable(
                    install_dir,
                    &record.title,
                    self.reader.as_ref(),
                ) {
                    record.launch_command = exe.to_string_lossy().into_owned();
                }
            }
            if record.installed && record.icon_path.is_empty() {
                if let Some(icon) = icons::discover_local_icon(install_dir, &record.title) {
                    record.icon_path = icon;
                }
            }
        }

        Ok(record)
    }
}

impl GameSource for JsonManifestSource {
    fn platform(&self) -> PlatformTag {
        self.platform.clone()
    }

    fn name(&self) -> &str {
        "json-manifests"
    }

    fn scan(&self) -> Result<Vec<ScanPass>> {
        let entries = fs::read_dir(&self.dir)?;
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
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
            if !is_manifest {
                continue;
            }
            match self.read_manifest(&path) {
                Ok(record) => records.push(record),
                Err(e) => {
                    // The whole document is discarded as zero records.
                    warn!(manifest = %path.display(), error = %e, "discarding manifest");
                    failures += 1;
                }
            }
        }

        // A scan that could not account for every manifest cannot vouch
        // for absences.
        Ok(vec![ScanPass {
            records,
            complete: failures == 0,
        }])
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn write_manifest(dir: &Path, name: &str, body: &str) {
        fs::write(dir.join(name), body).unwrap();
    }

    #[test]
    fn scans_flat_and_nested_manifests() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(
            dir.path(),
            "alpha.json",
            r#"{"gameId": "a1", "name": "Alpha", "launchCommand": "/bin/alpha", "icon": "https://cdn/a.png"}"#,
        );
        write_manifest(
            dir.path(),
            "beta.json",
            r#"{"meta": {"format": 2}, "payload": {"gameId": "b2", "name": "Beta"}}"#,
        );
        write_manifest(dir.path(), "notes.txt", "not a manifest");

        let source = JsonManifestSource::new(PlatformTag::new("shelf"), dir.path());
        let passes = source.scan().unwrap();
        assert_eq!(passes.len(), 1);
        assert!(passes[0].complete);

        let mut ids: Vec<&str> = passes[0].records.iter().map(|r| r.id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, vec!["a1", "b2"]);

        let alpha = passes[0].records.iter().find(|r| r.id == "a1").unwrap();
        assert_eq!(alpha.title, "Alpha");
        assert_eq!(alpha.launch_command, "/bin/alpha");
        assert_eq!(alpha.icon_path, "https://cdn/a.png");
    }

    #[test]
    fn malformed_manifest_is_discarded_and_marks_the_pass_incomplete() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(dir.path(), "good.json", r#"{"gameId": "g", "name": "Good"}"#);
        write_manifest(dir.path(), "bad.json", r#"{"gameId": "x", "name": "#);

        let source = JsonManifestSource::new(PlatformTag::new("shelf"), dir.path());
        let passes = source.scan().unwrap();
        assert_eq!(passes[0].records.len(), 1);
        assert_eq!(passes[0].records[0].id, "g");
        assert!(!passes[0].complete);
    }

    #[test]
    fn install_directory_drives_matcher_and_icon_discovery() {
        let games = tempfile::tempdir().unwrap();
        let install = games.path().join("SteelSky");
        fs::create_dir(&install).unwrap();
        fs::write(install.join("steelsky.exe"), b"bin").unwrap();
        fs::write(install.join("icon.png"), b"png").unwrap();

        let dir = tempfile::tempdir().unwrap();
        write_manifest(
            dir.path(),
            "steelsky.json",
            &format!(
                r#"{{"gameId": "ss", "name": "Steel Sky", "installDirectory": "{}"}}"#,
                install.display()
            ),
        );

        let source = JsonManifestSource::new(PlatformTag::new("shelf"), dir.path());
        let passes = source.scan().unwrap();
        let record = &passes[0].records[0];
        assert!(record.installed);
        assert!(record.launch_command.ends_with("steelsky.exe"));
        assert!(record.icon_path.ends_with("icon.png"));
    }

    #[test]
    fn missing_directory_is_a_source_level_error() {
        let source =
            JsonManifestSource::new(PlatformTag::new("shelf"), "/nonexistent/manifests");
        assert!(source.scan().is_err());
    }
}
