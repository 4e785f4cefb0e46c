//! Artwork cache for game records.
//!
//! Downloading is not this crate's job: the frontend (or whatever owns
//! the network) fetches icon bytes and hands them over. This module owns
//! the cache layout: a deterministic local slot per remote URL, `file://`
//! passthrough for artwork that is already on disk, and discovery of icon
//! files shipped inside an install directory so a record can get artwork
//! without any download at all.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

const ICON_EXTENSIONS: &[&str] = &["icns", "png", "ico", "jpg", "jpeg"];

/// Cache directory for artwork on the current platform.
fn artwork_cache_dir() -> Result<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        let home = std::env::var("HOME")
            .map_err(|_| Error::Environment("HOME environment variable not set".into()))?;
        Ok(PathBuf::from(format!(
            "{}/Library/Caches/Gameshelf/artwork",
            home
        )))
    }

    #[cfg(target_os = "windows")]
    {
        let appdata = std::env::var("LOCALAPPDATA")
            .map_err(|_| Error::Environment("LOCALAPPDATA environment variable not set".into()))?;
        Ok(PathBuf::from(format!("{}\\Gameshelf\\artwork", appdata)))
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        let home = std::env::var("HOME")
            .map_err(|_| Error::Environment("HOME environment variable not set".into()))?;
        Ok(PathBuf::from(format!("{}/.cache/gameshelf/artwork", home)))
    }
}

fn ensure_cache_dir() -> Result<PathBuf> {
    let dir = artwork_cache_dir()?;
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Hash-based cache filename for a URL, preserving the extension when it
/// looks like one.
fn url_to_cache_filename(url: &str) -> String {
    let hash = format!("{:x}", md5::compute(url.as_bytes()));
    if let Some(extension) = url.rsplit('.').next() {
        if extension.len() <= 4 && extension.chars().all(|c| c.is_ascii_alphanumeric()) {
            return format!("{}.{}", hash, extension);
        }
    }
    hash
}

/// The cache slot a given remote URL maps to, whether or not anything has
/// been stored there yet.
pub fn cache_path_for(url: &str) -> Result<PathBuf> {
    Ok(artwork_cache_dir()?.join(url_to_cache_filename(url)))
}

/// Write fetched artwork bytes into the slot for `url`. Called by the
/// external downloader once it has the data.
pub fn store_artwork(url: &str, data: &[u8]) -> Result<PathBuf> {
    let dir = ensure_cache_dir()?;
    let path = dir.join(url_to_cache_filename(url));
    fs::write(&path, data)?;
    Ok(path)
}

/// Local path for `url` if it is already available: `file://` URLs resolve
/// directly, anything else is looked up in the cache.
pub fn cached_artwork(url: &str) -> Option<PathBuf> {
    if let Some(local) = url.strip_prefix("file://") {
        let path = PathBuf::from(local);
        return path.exists().then_some(path);
    }
    let path = cache_path_for(url).ok()?;
    path.exists().then_some(path)
}

/// Remove every cached artwork file.
pub fn clear_artwork_cache() -> Result<()> {
    let dir = artwork_cache_dir()?;
    if dir.exists() {
        fs::remove_dir_all(&dir)?;
        fs::create_dir_all(&dir)?;
    }
    Ok(())
}

/// Look for an icon file shipped with the game itself, preferring files
/// named after the title or a conventional icon name. Returns a `file://`
/// URL suitable for a record's icon field.
pub fn discover_local_icon(install_dir: &Path, title: &str) -> Option<String> {
    let title_key = title.to_lowercase().replace(' ', "");
    let mut fallback = None;

    let mut search_dirs = vec![install_dir.to_path_buf()];
    for sub in ["icons", "assets", "resources"] {
        let dir = install_dir.join(sub);
        if dir.is_dir() {
            search_dirs.push(dir);
        }
    }

    for dir in search_dirs {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(_) => continue,
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(ext) = path.extension() else {
                continue;
            };
            if !ICON_EXTENSIONS.contains(&ext.to_string_lossy().to_lowercase().as_str()) {
                continue;
            }
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().to_lowercase())
                .unwrap_or_default();
            if (!title_key.is_empty() && stem.replace(' ', "").contains(&title_key))
                || stem.starts_with("icon")
                || stem.starts_with("logo")
            {
                return Some(format!("file://{}", path.display()));
            }
            if fallback.is_none() {
                fallback = Some(format!("file://{}", path.display()));
            }
        }
    }

    fallback
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn cache_filenames_are_stable_and_keep_plausible_extensions() {
        let a = url_to_cache_filename("https://cdn.example.com/covers/440.png");
        let b = url_to_cache_filename("https://cdn.example.com/covers/440.png");
        assert_eq!(a, b);
        assert!(a.ends_with(".png"));
    }

    #[test]
    fn urls_without_an_extension_get_a_bare_hash() {
        let name = url_to_cache_filename("https://cdn.example.com/covers/steelsky-cover");
        assert!(!name.contains('.'));
        assert_eq!(name.len(), 32);
    }

    #[test]
    fn file_urls_resolve_directly() {
        let dir = tempfile::tempdir().unwrap();
        let icon = dir.path().join("cover.png");
        std::fs::write(&icon, b"png").unwrap();
        let url = format!("file://{}", icon.display());
        assert_eq!(cached_artwork(&url), Some(icon));
        assert_eq!(cached_artwork("file:///does/not/exist.png"), None);
    }

    #[test]
    fn local_icon_discovery_prefers_title_named_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("readme.txt"), b"x").unwrap();
        std::fs::write(dir.path().join("banner.png"), b"x").unwrap();
        std::fs::write(dir.path().join("steelsky.png"), b"x").unwrap();

        let found = discover_local_icon(dir.path(), "Steel Sky").unwrap();
        assert!(found.ends_with("steelsky.png"), "{found}");
    }

    #[test]
    fn local_icon_discovery_falls_back_to_any_icon_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("banner.jpg"), b"x").unwrap();
        let found = discover_local_icon(dir.path(), "Unrelated").unwrap();
        assert!(found.ends_with("banner.jpg"), "{found}");
    }

    #[test]
    fn no_icon_files_means_none() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("game.txt"), b"x").unwrap();
        assert_eq!(discover_local_icon(dir.path(), "Game"), None);
    }
}
