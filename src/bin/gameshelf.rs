use std::path::PathBuf;

use anyhow::{bail, Result};
use tracing_subscriber::EnvFilter;

use gameshelf_core::sources::{
    FlatConfigSource, JsonManifestSource, KvLibrarySource, SqliteCatalogSource,
};
use gameshelf_core::{Library, PlatformTag, SqliteStore};

const USAGE: &str = "usage: gameshelf <platform> [--catalog DB] \
    [--json-manifests DIR] [--kv-library DIR] [--vendor-db FILE] [--custom FILE]";

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let Some(platform) = args.next() else {
        bail!("{USAGE}");
    };
    let platform = PlatformTag::new(platform);

    let mut catalog_db: Option<PathBuf> = None;
    let mut sources: Vec<(String, String)> = Vec::new();
    while let Some(flag) = args.next() {
        let Some(value) = args.next() else {
            bail!("{flag} needs a value\n{USAGE}");
        };
        match flag.as_str() {
            "--catalog" => catalog_db = Some(PathBuf::from(value)),
            "--json-manifests" | "--kv-library" | "--vendor-db" | "--custom" => {
                sources.push((flag, value));
            }
            _ => bail!("unknown flag {flag}\n{USAGE}"),
        }
    }

    let store = match catalog_db {
        Some(path) => SqliteStore::open(&path)?,
        None => SqliteStore::open_in_memory()?,
    };
    let mut library = Library::new(Box::new(store));
    for (flag, value) in sources {
        match flag.as_str() {
            "--json-manifests" => library
                .register_source(Box::new(JsonManifestSource::new(platform.clone(), value))),
            "--kv-library" => {
                library.register_source(Box::new(KvLibrarySource::new(platform.clone(), value)))
            }
            "--vendor-db" => library
                .register_source(Box::new(SqliteCatalogSource::new(platform.clone(), value))),
            "--custom" => {
                library.register_source(Box::new(FlatConfigSource::new(platform.clone(), value)))
            }
            _ => unreachable!(),
        }
    }

    let delta = library.rescan_platform(&platform)?;
    println!(
        "{platform}: {} added, {} removed",
        delta.added.len(),
        delta.removed.len()
    );
    for id in library.catalog().views(&platform).all {
        if let Some(record) = library.catalog().get(&platform, &id) {
            let marker = if record.installed { "*" } else { " " };
            println!("{marker} {:<40} {}", record.title, record.id);
        }
    }

    Ok(())
}
