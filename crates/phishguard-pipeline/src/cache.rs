//! Analysis Cache (C10): a TTL-bounded cache of complete [`AnalysisResult`]s
//! keyed by the MD5 of the normalised URL.
//!
//! Reads take only a shared lock on the entry map; insertion order is
//! tracked in a separate lock taken only on insert, so the common
//! "many reads, occasional insert" traffic pattern never blocks readers
//! against each other.

use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;
use std::time::{Duration, Instant};

use md5::{Digest, Md5};
use phishguard_core::domain;
use phishguard_core::types::AnalysisResult;

/// Default cache TTL.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);
/// Default maximum entry count.
pub const DEFAULT_CAPACITY: usize = 10_000;

struct Entry {
    result: AnalysisResult,
    inserted_at: Instant,
}

/// A bounded, TTL-expiring cache of complete analysis results.
pub struct AnalysisCache {
    ttl: Duration,
    capacity: usize,
    entries: RwLock<HashMap<String, Entry>>,
    order: RwLock<VecDeque<String>>,
}

impl AnalysisCache {
    /// Construct a cache with the given TTL and entry capacity.
    #[must_use]
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            capacity,
            entries: RwLock::new(HashMap::new()),
            order: RwLock::new(VecDeque::new()),
        }
    }

    /// The cache key for `url`: MD5 of the normalised URL string, hex
    /// encoded. Not a security boundary — only a cache identity.
    #[must_use]
    pub fn key_for(url: &str) -> String {
        let normalized = domain::normalize(url);
        let mut hasher = Md5::new();
        hasher.update(normalized.as_bytes());
        let digest = hasher.finalize();
        digest.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Look up a cached result for `url`. An expired entry reads as a miss
    /// but is not eagerly removed; it is reclaimed on the next insert that
    /// needs the capacity.
    #[must_use]
    pub fn get(&self, url: &str) -> Option<AnalysisResult> {
        let key = Self::key_for(url);
        let entries = self.entries.read().expect("analysis cache lock poisoned");
        let entry = entries.get(&key)?;
        if entry.inserted_at.elapsed() > self.ttl {
            return None;
        }
        Some(entry.result.clone())
    }

    /// Insert a complete result for `url`, evicting expired or
    /// least-recently-inserted entries first if at capacity.
    pub fn insert(&self, url: &str, result: AnalysisResult) {
        let key = Self::key_for(url);

        let mut entries = self.entries.write().expect("analysis cache lock poisoned");
        let mut order = self.order.write().expect("analysis cache order lock poisoned");

        if !entries.contains_key(&key) {
            order.push_back(key.clone());
        }

        entries.insert(
            key,
            Entry {
                result,
                inserted_at: Instant::now(),
            },
        );

        while entries.len() > self.capacity {
            let Some(oldest) = order.pop_front() else {
                break;
            };
            entries.remove(&oldest);
        }
    }

    /// Current entry count, including any not-yet-reclaimed expired entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().expect("analysis cache lock poisoned").len()
    }

    /// `true` if the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for AnalysisCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL, DEFAULT_CAPACITY)
    }
}
