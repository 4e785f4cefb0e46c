//! Heuristic selection of the primary executable in an install directory.
//!
//! Several sources record where a game lives but not how to start it.
//! Executables frequently ship under abbreviated or unrelated filenames, so
//! a plain "pick the .exe" is not enough: the acronym test recovers short
//! forms (a four-word title matching a four-letter binary), and a second
//! pass over the install folder's own name recovers cases where the
//! store's display name and the actual directory disagree.
//!
//! This module never fails; "no match" is an empty result and means "not
//! automatically launchable", not an error.

use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

/// Reader for the free-text description embedded in an executable's
/// metadata. Returns an empty string when nothing is known.
pub trait DescriptionReader {
    fn description(&self, path: &Path) -> String;
}

/// Reader for platforms where no metadata backend is wired up.
pub struct NoDescriptions;

impl DescriptionReader for NoDescriptions {
    fn description(&self, _path: &Path) -> String {
        String::new()
    }
}

/// One executable file found under an install directory.
#[derive(Debug, Clone)]
pub struct CandidateExecutable {
    pub path: PathBuf,
    pub description: String,
    pub stem: String,
}

/// Derive an acronym from a title: the first letter of each word, splitting
/// on space, colon, hyphen and underscore.
pub fn acronym(title: &str) -> String {
    title
        .split(|c| matches!(c, ' ' | ':' | '-' | '_'))
        .filter_map(|word| word.chars().next())
        .collect()
}

/// Best-guess absolute path to the primary executable under `dir` for a
/// game with the given display title, or `None` when the heuristic finds
/// nothing it trusts.
pub fn find_primary_executable(
    dir: &Path,
    title: &str,
    reader: &dyn DescriptionReader,
) -> Option<PathBuf> {
    let mut candidates = collect_candidates(dir);
    if candidates.is_empty() {
        return None;
    }
    if candidates.len() == 1 {
        return Some(candidates.remove(0).path);
    }

    for candidate in &mut candidates {
        candidate.description = reader.description(&candidate.path);
    }

    if let Some(found) = first_match(&candidates, title) {
        return Some(found);
    }

    // Install folders frequently diverge from display titles; retry with
    // the directory's own name.
    let dir_name = dir.file_name()?.to_string_lossy();
    if dir_name != title {
        if let Some(found) = first_match(&candidates, &dir_name) {
            return Some(found);
        }
    }

    debug!(dir = %dir.display(), title, "no executable matched");
    None
}

/// All executable files under `dir`, in stable filename order, minus
/// anything living under a "redist" path segment: bundled redistributable
/// installers are never the right answer.
fn collect_candidates(dir: &Path) -> Vec<CandidateExecutable> {
    let mut candidates = Vec::new();
    for entry in WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.to_string_lossy().to_lowercase().contains("redist") {
            continue;
        }
        if !is_executable(path) {
            continue;
        }
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        candidates.push(CandidateExecutable {
            path: path.to_path_buf(),
            description: String::new(),
            stem,
        });
    }
    candidates
}

fn is_executable(path: &Path) -> bool {
    if let Some(ext) = path.extension() {
        let ext = ext.to_string_lossy();
        if ext.eq_ignore_ascii_case("exe") {
            return true;
        }
        // Shared libraries carry the executable bit on most installs.
        if matches!(ext.to_lowercase().as_str(), "dll" | "so" | "dylib") {
            return false;
        }
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(meta) = path.metadata() {
            return meta.permissions().mode() & 0o111 != 0;
        }
    }
    false
}

/// First candidate, in enumeration order, matching the given text by the
/// acronym or word heuristics.
fn first_match(candidates: &[CandidateExecutable], text: &str) -> Option<PathBuf> {
    let acr = acronym(text).to_lowercase();
    let words: Vec<String> = text
        .split(|c| matches!(c, ' ' | ':' | '-' | '_'))
        .filter(|w| w.chars().count() >= 3)
        .map(str::to_lowercase)
        .collect();

    for candidate in candidates {
        let stem = candidate.stem.to_lowercase();
        let desc = candidate.description.to_lowercase();

        if acr.len() > 2 && (stem.contains(&acr) || acr.contains(&stem)) {
            return Some(candidate.path.clone());
        }
        if acr.len() > 2 && !desc.is_empty() && (desc.contains(&acr) || acr.contains(&desc)) {
            return Some(candidate.path.clone());
        }
        if words
            .iter()
            .any(|w| stem.contains(w) || (!desc.is_empty() && desc.contains(w)))
        {
            return Some(candidate.path.clone());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::fs;

    use pretty_assertions::assert_eq;

    use super::*;

    /// Scripted reader mapping file stems to descriptions.
    struct FakeReader(HashMap<String, String>);

    impl FakeReader {
        fn new(entries: &[(&str, &str)]) -> Self {
            Self(
                entries
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            )
        }
    }

    impl DescriptionReader for FakeReader {
        fn description(&self, path: &Path) -> String {
            path.file_stem()
                .and_then(|s| self.0.get(&s.to_string_lossy().into_owned()))
                .cloned()
                .unwrap_or_default()
        }
    }

    fn touch(dir: &Path, rel: &str) {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, b"binary").unwrap();
    }

    #[test]
    fn acronym_splits_on_all_separators() {
        assert_eq!(acronym("Grand Theft Auto V"), "GTAV");
        assert_eq!(acronym("Half-Life: Alyx"), "HLA");
        assert_eq!(acronym("some_long_name"), "sln");
        assert_eq!(acronym(""), "");
    }

    #[test]
    fn single_candidate_wins_for_any_title() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "Game.exe");
        let found =
            find_primary_executable(dir.path(), "Totally Unrelated Title", &NoDescriptions);
        assert_eq!(found, Some(dir.path().join("Game.exe")));
    }

    #[test]
    fn redist_binaries_are_never_picked() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "GTA5.exe");
        touch(dir.path(), "Redist/vcredist_x64.exe");
        let found = find_primary_executable(dir.path(), "Grand Theft Auto V", &NoDescriptions);
        assert_eq!(found, Some(dir.path().join("GTA5.exe")));
    }

    #[test]
    fn acronym_matches_abbreviated_binaries() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "gtav.exe");
        touch(dir.path(), "launcher_helper.exe");
        let found = find_primary_executable(dir.path(), "Grand Theft Auto V", &NoDescriptions);
        assert_eq!(found, Some(dir.path().join("gtav.exe")));
    }

    #[test]
    fn title_words_match_the_stem() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "SkyrimSE.exe");
        touch(dir.path(), "crashpad.exe");
        let found = find_primary_executable(dir.path(), "Skyrim Special Edition", &NoDescriptions);
        assert_eq!(found, Some(dir.path().join("SkyrimSE.exe")));
    }

    #[test]
    fn description_metadata_can_decide() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "aaa.exe");
        touch(dir.path(), "zzz.exe");
        let reader = FakeReader::new(&[("zzz", "Grand Theft Auto V retail build")]);
        let found = find_primary_executable(dir.path(), "Grand Theft Auto V", &reader);
        assert_eq!(found, Some(dir.path().join("zzz.exe")));
    }

    #[test]
    fn install_folder_name_is_the_fallback() {
        let base = tempfile::tempdir().unwrap();
        let dir = base.path().join("SteelSky");
        fs::create_dir(&dir).unwrap();
        touch(&dir, "steelsky.exe");
        touch(&dir, "unrelated.exe");
        // Display title shares nothing with the binary; the folder name does.
        let found = find_primary_executable(&dir, "Beneath a Blue Heaven", &NoDescriptions);
        assert_eq!(found, Some(dir.join("steelsky.exe")));
    }

    #[test]
    fn nothing_matching_yields_none() {
        let base = tempfile::tempdir().unwrap();
        let dir = base.path().join("xy");
        fs::create_dir(&dir).unwrap();
        touch(&dir, "one.exe");
        touch(&dir, "two.exe");
        let found = find_primary_executable(&dir, "Q", &NoDescriptions);
        assert_eq!(found, None);
    }

    #[test]
    fn empty_directory_yields_none() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            find_primary_executable(dir.path(), "Anything", &NoDescriptions),
            None
        );
    }
}
