//! Scanner for an uninstall branch of the OS registry.
//!
//! Rows are found with the pruned value search: any key carrying the
//! configured field (typically `InstallLocation` or `Publisher`) with the
//! required substring is a game entry, and its subtree is not descended
//! into. The launcher's own registry entry is excluded by name so the
//! search never walks into it.

use tracing::warn;
use winreg::enums::{HKEY_CURRENT_USER, HKEY_LOCAL_MACHINE};
use winreg::RegKey;

use crate::error::{Error, Result};
use crate::game::{GameRecord, PlatformTag};
use crate::matcher::{self, DescriptionReader, NoDescriptions};
use crate::node::registry::RegistryNode;
use crate::search::find_by_value_match;
use crate::sources::{GameSource, ScanPass};

/// Which predefined hive the branch lives under.
#[derive(Debug, Clone, Copy)]
pub enum Hive {
    LocalMachine,
    CurrentUser,
}

pub struct RegistryTreeSource {
    platform: PlatformTag,
    hive: Hive,
    branch: String,
    match_field: String,
    required_substring: String,
    exclude_subtrees: Vec<String>,
    reader: Box<dyn DescriptionReader + Send + Sync>,
}

impl RegistryTreeSource {
    pub fn new(
        platform: PlatformTag,
        hive: Hive,
        branch: impl Into<String>,
        match_field: impl Into<String>,
        required_substring: impl Into<String>,
        exclude_subtrees: Vec<String>,
    ) -> Self {
        Self {
            platform,
            hive,
            branch: branch.into(),
            match_field: match_field.into(),
            required_substring: required_substring.into(),
            exclude_subtrees,
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
}

impl GameSource for RegistryTreeSource {
    fn platform(&self) -> PlatformTag {
        self.platform.clone()
    }

    fn name(&self) -> &str {
        "registry-tree"
    }

    fn scan(&self) -> Result<Vec<ScanPass>> {
        let hive = match self.hive {
            Hive::LocalMachine => RegKey::predef(HKEY_LOCAL_MACHINE),
            Hive::CurrentUser => RegKey::predef(HKEY_CURRENT_USER),
        };
        let root = RegistryNode::open(hive, &self.branch)
            .map_err(|e| Error::Node(format!("{}: {e}", self.branch)))?;

        let excludes: Vec<&str> = self.exclude_subtrees.iter().map(String::as_str).collect();
        let hits = find_by_value_match(
            root,
            &self.match_field,
            &self.required_substring,
            &excludes,
        );

        let mut records = Vec::new();
        for hit in hits {
            // The key name is the only stable identity a registry row has.
            let title = match hit.get("DisplayName") {
                Some(title) if !title.is_empty() => title.to_string(),
                _ => {
                    warn!(key = %hit.name, "uninstall entry without a display name");
                    continue;
                }
            };
            let mut record = GameRecord::new(self.platform.clone(), hit.name.clone(), title);
            record.installed = true;
            record.uninstall_command = hit.get("UninstallString").unwrap_or_default().to_string();
            record.icon_path = hit.get("DisplayIcon").unwrap_or_default().to_string();

            if let Some(install_dir) = hit.get("InstallLocation") {
                let dir = std::path::Path::new(install_dir);
                if dir.is_dir() {
                    if let Some(exe) = matcher::find_primary_executable(
                        dir,
                        &record.title,
                        self.reader.as_ref(),
                    ) {
                        record.launch_command = exe.to_string_lossy().into_owned();
                    }
                }
            }
            records.push(record);
        }

        Ok(vec![ScanPass::complete(records)])
    }
}
