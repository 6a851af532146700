//! Catalog Store
//!
//! Holds the current catalog of every provider. Each provider has its own
//! lock-free slot: readers load an `Arc` snapshot, the updater swaps in a
//! whole new catalog. Neither side ever blocks the other, and a reader
//! sees either the old catalog or the new one, never a mix.
//!
//! Snapshots of the whole store can be written to and read from a JSON
//! file, and compiled-in listings can seed a fresh store.

use crate::listing::{parse_listing, ListingError};
use crate::models::{CatalogError, ProviderCatalog};
use crate::provider::Provider;
use arc_swap::ArcSwapOption;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Version of the snapshot file format
const SNAPSHOT_VERSION: u32 = 1;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Snapshot version mismatch: expected {expected}, got {got}")]
    VersionMismatch { expected: u32, got: u32 },

    #[error("{0} appears more than once")]
    DuplicateProvider(Provider),

    #[error("Invalid catalog: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Invalid listing: {0}")]
    Listing(#[from] ListingError),
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    catalogs: Vec<ProviderCatalog>,
}

/// Per-provider catalogs
pub struct CatalogStore {
    slots: HashMap<Provider, ArcSwapOption<ProviderCatalog>>,
}

impl CatalogStore {
    /// Create a store with no catalog for any provider
    pub fn new() -> Self {
        let slots = Provider::all()
            .iter()
            .map(|provider| (*provider, ArcSwapOption::empty()))
            .collect();
        Self { slots }
    }

    /// Create a store seeded with existing catalogs
    pub fn from_catalogs(
        catalogs: impl IntoIterator<Item = ProviderCatalog>,
    ) -> Result<Self, StoreError> {
        let store = Self::new();
        for catalog in catalogs {
            catalog.validate()?;
            let provider = catalog.provider;
            if store.get(provider).is_some() {
                return Err(StoreError::DuplicateProvider(provider));
            }
            store.replace(Arc::new(catalog));
        }
        Ok(store)
    }

    /// Create a store seeded with rendered listings
    pub fn from_listings(listings: &[&str]) -> Result<Self, StoreError> {
        let catalogs = listings
            .iter()
            .map(|text| parse_listing(text))
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_catalogs(catalogs)
    }

    /// Current catalog of a provider
    pub fn get(&self, provider: Provider) -> Option<Arc<ProviderCatalog>> {
        self.slots.get(&provider)?.load_full()
    }

    /// Swap in a provider's new catalog
    pub(crate) fn replace(&self, catalog: Arc<ProviderCatalog>) {
        if let Some(slot) = self.slots.get(&catalog.provider) {
            debug!(
                "Catalog store: {} now has {} servers",
                catalog.provider,
                catalog.len()
            );
            slot.store(Some(catalog));
        }
    }

    /// All present catalogs, in provider order
    pub fn snapshot(&self) -> Vec<Arc<ProviderCatalog>> {
        Provider::all()
            .iter()
            .filter_map(|provider| self.get(*provider))
            .collect()
    }

    /// Serialize every present catalog
    pub fn to_json(&self) -> Result<String, StoreError> {
        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            catalogs: self
                .snapshot()
                .iter()
                .map(|catalog| catalog.as_ref().clone())
                .collect(),
        };
        Ok(serde_json::to_string_pretty(&snapshot)?)
    }

    /// Load a store from a JSON snapshot
    pub fn from_json(content: &str) -> Result<Self, StoreError> {
        let snapshot: Snapshot = serde_json::from_str(content)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(StoreError::VersionMismatch {
                expected: SNAPSHOT_VERSION,
                got: snapshot.version,
            });
        }
        Self::from_catalogs(snapshot.catalogs)
    }

    /// Load a store from a snapshot file
    pub fn load_file(path: &Path) -> Result<Self, StoreError> {
        let content = fs::read_to_string(path)?;
        let store = Self::from_json(&content)?;
        info!(
            "Loaded {} catalogs from {}",
            store.snapshot().len(),
            path.display()
        );
        Ok(store)
    }

    /// Write a snapshot file atomically (temp file + rename)
    pub fn save_file(&self, path: &Path) -> Result<(), StoreError> {
        let json = self.to_json()?;
        let temp_path = path.with_extension("json.tmp");

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&temp_path, json)?;
        fs::rename(&temp_path, path)?;

        debug!("Saved catalog snapshot to {}", path.display());
        Ok(())
    }
}

impl Default for CatalogStore {
    fn default() -> Self {
        Self::new()
    }
}
