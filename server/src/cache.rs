//! In-memory analysis store with TTL expiration
//!
//! Each analysis sits behind its own mutex so follow-up requests for one id
//! run one at a time, while requests for different ids never wait on each
//! other. The map itself is only write-locked to insert or purge.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use groundfinder_core::{Analysis, RegionMap};
use image::RgbImage;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

/// A cached entry with expiration time
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn new(value: V, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Everything follow-up requests need for one upload
pub struct AnalysisEntry {
    /// Decoded upload at full resolution, for rendering
    pub original: Arc<RgbImage>,
    /// Downsampled buffer the analysis ran on
    pub working: Arc<RgbImage>,
    pub analysis: Arc<Analysis>,
    /// Form interiors of `working`, computed on first ground-inside request
    pub regions: Option<Arc<RegionMap>>,
}

impl AnalysisEntry {
    pub fn new(original: RgbImage, working: RgbImage, analysis: Analysis) -> Self {
        Self {
            original: Arc::new(original),
            working: Arc::new(working),
            analysis: Arc::new(analysis),
            regions: None,
        }
    }
}

pub type SharedEntry = Arc<Mutex<AnalysisEntry>>;

pub struct AnalysisStore {
    ttl: Duration,
    entries: RwLock<HashMap<Uuid, CacheEntry<SharedEntry>>>,
}

impl AnalysisStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Store an analysis under a fresh id
    pub async fn insert(&self, entry: AnalysisEntry) -> Uuid {
        let id = Uuid::new_v4();
        let mut entries = self.entries.write().await;
        entries.insert(id, CacheEntry::new(Arc::new(Mutex::new(entry)), self.ttl));
        id
    }

    /// Get an analysis if present and not expired
    pub async fn get(&self, id: &Uuid) -> Option<SharedEntry> {
        let entries = self.entries.read().await;
        entries.get(id).and_then(|entry| {
            if entry.is_expired() {
                None
            } else {
                Some(entry.value.clone())
            }
        })
    }

    /// Drop expired entries, returning how many were removed
    pub async fn purge_expired(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired());
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}
