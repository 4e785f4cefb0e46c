//! Refresh orchestration and the caller-facing operations.
//!
//! [`Library`] owns the catalog, the persistent store and the registered
//! source adapters. A platform rescan fans the platform's sources out to
//! parallel workers (every source read is blocking file or registry I/O),
//! collects their passes through one shared sink, unions the passes into a
//! single fresh-record set and reconciles that against the catalog. All
//! catalog mutation happens on the caller's thread, so reconciliation is
//! single-writer per platform.

use std::collections::HashSet;
use std::sync::Mutex;
use std::thread;

use tracing::{info, warn};

use crate::error::Result;
use crate::game::{GameId, PlatformTag};
use crate::reconcile::{reconcile_scan, union_passes, Catalog, ScanDelta};
use crate::sources::{GameSource, ScanPass};
use crate::store::CatalogStore;

pub struct Library {
    catalog: Catalog,
    store: Box<dyn CatalogStore>,
    sources: Vec<Box<dyn GameSource>>,
    loaded: HashSet<PlatformTag>,
}

impl Library {
    pub fn new(store: Box<dyn CatalogStore>) -> Self {
        Self {
            catalog: Catalog::new(),
            store,
            sources: Vec::new(),
            loaded: HashSet::new(),
        }
    }

    pub fn register_source(&mut self, source: Box<dyn GameSource>) {
        self.sources.push(source);
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Pull a platform's stored records into the catalog, once.
    fn ensure_loaded(&mut self, platform: &PlatformTag) -> Result<()> {
        if self.loaded.contains(platform) {
            return Ok(());
        }
        for record in self.store.load(platform)? {
            self.catalog.restore(record);
        }
        self.loaded.insert(platform.clone());
        Ok(())
    }

    /// Rescan every source registered for `platform` and reconcile the
    /// result. Returns what was added and removed.
    ///
    /// A failed source contributes zero records and forces the scan to be
    /// treated as incomplete, so its absences prove nothing.
    pub fn rescan_platform(&mut self, platform: &PlatformTag) -> Result<ScanDelta> {
        self.ensure_loaded(platform)?;

        let sources: Vec<&dyn GameSource> = self
            .sources
            .iter()
            .filter(|s| &s.platform() == platform)
            .map(Box::as_ref)
            .collect();
        if sources.is_empty() {
            warn!(%platform, "no sources registered");
            return Ok(ScanDelta::default());
        }

        let sink: Mutex<Vec<(String, Result<Vec<ScanPass>>)>> = Mutex::new(Vec::new());
        thread::scope(|scope| {
            for source in &sources {
                let sink = &sink;
                scope.spawn(move || {
                    let outcome = source.scan();
                    let mut sink = match sink.lock() {
                        Ok(guard) => guard,
                        Err(poisoned) => poisoned.into_inner(),
                    };
                    sink.push((source.name().to_string(), outcome));
                });
            }
        });
        let outcomes = match sink.into_inner() {
            Ok(outcomes) => outcomes,
            Err(poisoned) => poisoned.into_inner(),
        };

        let mut passes = Vec::new();
        let mut all_sources_ok = true;
        for (name, outcome) in outcomes {
            match outcome {
                Ok(source_passes) => passes.extend(source_passes),
                Err(e) => {
                    warn!(source = %name, error = %e, "source unavailable, skipping");
                    all_sources_ok = false;
                }
            }
        }

        let (fresh, passes_complete) = union_passes(passes);
        let complete = all_sources_ok && passes_complete;
        let delta = reconcile_scan(&self.catalog, platform, &fresh, complete);

        for record in &delta.removed {
            self.store.delete(platform, &record.id)?;
        }
        let fresh_ids: Vec<GameId> = fresh.iter().map(|r| r.id.clone()).collect();
        self.catalog.absorb(platform, fresh, &delta);
        // Upsert everything the scan saw, so refreshed source-owned fields
        // reach the store along with the additions.
        for id in &fresh_ids {
            if let Some(record) = self.catalog.get(platform, id) {
                self.store.insert(record)?;
            }
        }

        info!(
            %platform,
            added = delta.added.len(),
            removed = delta.removed.len(),
            complete,
            "rescan finished"
        );
        Ok(delta)
    }

    /// Flip a record's favourite flag, in the catalog and the store.
    pub fn toggle_favourite(&mut self, platform: &PlatformTag, id: &str) -> Result<bool> {
        self.ensure_loaded(platform)?;
        let value = self.catalog.toggle_favourite(platform, id)?;
        self.store
            .update_flags(platform, id, Some(value), None, None)?;
        Ok(value)
    }

    /// Flip a record's hidden flag, in the catalog and the store.
    pub fn toggle_hidden(&mut self, platform: &PlatformTag, id: &str) -> Result<bool> {
        self.ensure_loaded(platform)?;
        let value = self.catalog.toggle_hidden(platform, id)?;
        self.store
            .update_flags(platform, id, None, Some(value), None)?;
        Ok(value)
    }

    /// Record a launch: boost the launched record, decay the rest of the
    /// platform, persist every affected frequency. Returns the launched
    /// record's new frequency.
    pub fn record_launch(&mut self, platform: &PlatformTag, id: &str) -> Result<f64> {
        self.ensure_loaded(platform)?;
        let frequency = self.catalog.update_frequency(platform, id, true)?;

        // The launched record is upserted whole so the play timestamp
        // persists too; the decayed rest only need their frequencies.
        if let Some(record) = self.catalog.get(platform, id) {
            self.store.insert(record)?;
        }
        let decayed: Vec<(GameId, f64)> = self
            .catalog
            .platform_records(platform)
            .iter()
            .filter(|r| r.id != id)
            .map(|r| (r.id.clone(), r.frequency))
            .collect();
        for (record_id, record_frequency) in decayed {
            self.store
                .update_flags(platform, &record_id, None, None, Some(record_frequency))?;
        }
        Ok(frequency)
    }
}
