//! Persisted hints for faster startup across runs.
//!
//! A store file remembers where unique patterns resolved inside a known
//! image, so a later run of the same build verifies one address per pattern
//! instead of scanning the whole range. Seeded hints stay advisory: every
//! entry is re-verified against live memory before a scan trusts it, so a
//! store from a changed build degrades to full scans instead of breaking.

use std::fs;
use std::path::Path;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::HintCache;
use crate::error::Result;

/// One persisted pattern-to-address resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HintRecord {
    pub hash: u64,
    pub addr: u64,
}

/// Saved hint table stamped with the image it was recorded against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HintStore {
    /// Identifier of the scanned image (path or build tag), caller-chosen.
    pub image: String,
    /// Store creation timestamp (Unix seconds)
    pub created_at: u64,
    /// Recorded resolutions
    pub entries: Vec<HintRecord>,
}

impl HintStore {
    pub fn new(image: String, entries: Vec<HintRecord>) -> Self {
        let created_at = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        Self {
            image,
            created_at,
            entries,
        }
    }

    /// Capture the current contents of a cache.
    pub fn from_cache(image: String, cache: &HintCache) -> Self {
        let entries = cache
            .snapshot()
            .into_iter()
            .map(|(hash, addr)| HintRecord {
                hash,
                addr: addr as u64,
            })
            .collect();
        Self::new(image, entries)
    }

    /// Load a store from a file, failing on absence or corruption.
    ///
    /// `Error::is_not_found` on the failure tells a missing store apart
    /// from an unreadable or corrupt one.
    pub fn read_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Load a store from a file, tolerating absence and corruption.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        let path = path.as_ref();
        match Self::read_from_path(path) {
            Ok(store) => {
                debug!(
                    "Loaded hint store: image={}, entries={}",
                    store.image,
                    store.entries.len()
                );
                Some(store)
            }
            Err(e) if e.is_not_found() => {
                debug!("No hint store at {}", path.display());
                None
            }
            Err(e) => {
                warn!("Failed to load hint store: {}", e);
                None
            }
        }
    }

    /// Save the store to a file.
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(&path, content)?;
        info!("Saved {} hints to {}", self.entries.len(), path.as_ref().display());
        Ok(())
    }

    /// Whether the store was recorded against the given image.
    ///
    /// No age check: a stale hint is caught by scan-time re-verification,
    /// the stamp only stops seeding a whole table from the wrong build.
    pub fn is_valid_for(&self, image: &str) -> bool {
        if self.image != image {
            debug!(
                "Hint store image mismatch: stored={}, current={}",
                self.image, image
            );
            return false;
        }
        true
    }

    /// Feed every entry into a cache.
    pub fn seed_into(&self, cache: &HintCache) {
        cache.seed(
            self.entries
                .iter()
                .map(|entry| (entry.hash, entry.addr as usize)),
        );
    }
}

/// Load a store and seed the cache from it if it matches the image.
pub fn try_seed_hints<P: AsRef<Path>>(path: P, image: &str, cache: &HintCache) -> bool {
    let Some(store) = HintStore::load_from_path(path) else {
        return false;
    };

    if !store.is_valid_for(image) {
        return false;
    }

    info!(
        "Seeding {} hints recorded for {}",
        store.entries.len(),
        store.image
    );
    store.seed_into(cache);
    true
}

/// Save the cache contents stamped with the given image.
pub fn save_hints<P: AsRef<Path>>(path: P, image: &str, cache: &HintCache) -> Result<()> {
    HintStore::from_cache(image.to_string(), cache).save_to_path(path)
}
