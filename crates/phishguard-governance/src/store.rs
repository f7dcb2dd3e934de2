//! Governance state persistence: a single combined `governance_state.json`
//! (overrides + canary + budget + freeze), read-modify-written under an
//! exclusive advisory file lock, with a 5-second-TTL cached view serving
//! read-mostly queries.
//!
//! NFS caveat: `fs2` advisory locks are not guaranteed exclusive across
//! all network filesystems. This store assumes a local filesystem, as the
//! governing design does; networked deployments need a distributed lock.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::{Duration, Instant};

use chrono::Utc;
use fs2::FileExt;
use phishguard_core::types::{CanarySignal, FreezeState, Override, SafetyBudgetState};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::GovernanceError;

const LOCK_TIMEOUT: Duration = Duration::from_secs(5);
const LOCK_RETRY_CEILING: u32 = 50;
const READ_CACHE_TTL: Duration = Duration::from_secs(5);

/// The combined, persisted governance state document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GovernanceState {
    /// Freeze lifecycle.
    pub freeze: FreezeState,
    /// Monotonic safety budget counters.
    pub budget: SafetyBudgetState,
    /// Active and historical overrides.
    pub overrides: Vec<Override>,
    /// Per-domain canary counters.
    pub canaries: FxHashMap<String, CanarySignal>,
    /// Last time this document was written.
    pub last_updated: chrono::DateTime<Utc>,
}

struct CachedView {
    fetched_at: Instant,
    state: GovernanceState,
}

/// Owns the governance state file and mediates all reads/writes to it.
///
/// The only write path is [`GovernanceStore::update`] — every mutation,
/// including override revocation, goes through the same
/// `(state) -> (state, T)` closure under the file lock, so no method can
/// independently serialise a stale in-memory copy over a concurrent
/// writer's output.
pub struct GovernanceStore {
    path: PathBuf,
    cache: RwLock<Option<CachedView>>,
}

impl GovernanceStore {
    /// Open (or prepare to create) the store at `path`. Does not read the
    /// file yet — first access happens lazily on the first `update`/`read`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: RwLock::new(None),
        }
    }

    /// Read-mostly queries (`is_frozen`, `get_safety_status`) go through
    /// this cached view, refreshed at most every 5 seconds. Bypassed
    /// unconditionally inside [`GovernanceStore::update`].
    pub fn read_cached(&self) -> Result<GovernanceState, GovernanceError> {
        {
            let cache = self.cache.read().expect("governance cache lock poisoned");
            if let Some(view) = cache.as_ref() {
                if view.fetched_at.elapsed() < READ_CACHE_TTL {
                    return Ok(view.state.clone());
                }
            }
        }
        let state = self.load_from_disk()?;
        let mut cache = self.cache.write().expect("governance cache lock poisoned");
        *cache = Some(CachedView {
            fetched_at: Instant::now(),
            state: state.clone(),
        });
        Ok(state)
    }

    /// The sole write path. Acquires the exclusive file lock, reads the
    /// current state (bypassing the cache), applies `f`, writes the
    /// result back, fsyncs, and releases the lock — then refreshes the
    /// cache with the new state.
    pub fn update<F, T>(&self, f: F) -> Result<T, GovernanceError>
    where
        F: FnOnce(&mut GovernanceState) -> T,
    {
        let path_str = self.path.display().to_string();
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| GovernanceError::StateIo {
                path: path_str.clone(),
                source,
            })?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&self.path)
            .map_err(|source| GovernanceError::StateIo {
                path: path_str.clone(),
                source,
            })?;

        self.acquire_exclusive(&file, &path_str)?;

        let result = (|| -> Result<T, GovernanceError> {
            let mut state = read_state_locked(&mut file, &path_str)?;
            let result = f(&mut state);
            state.last_updated = Utc::now();
            write_state_locked(&mut file, &state, &path_str)?;

            let mut cache = self.cache.write().expect("governance cache lock poisoned");
            *cache = Some(CachedView {
                fetched_at: Instant::now(),
                state,
            });
            Ok(result)
        })();

        let _ = fs2::FileExt::unlock(&file);
        result
    }

    fn load_from_disk(&self) -> Result<GovernanceState, GovernanceError> {
        let path_str = self.path.display().to_string();
        if !self.path.exists() {
            return Ok(GovernanceState::default());
        }
        let mut file = OpenOptions::new()
            .read(true)
            .open(&self.path)
            .map_err(|source| GovernanceError::StateIo {
                path: path_str.clone(),
                source,
            })?;
        read_state_locked(&mut file, &path_str)
    }

    fn acquire_exclusive(&self, file: &File, path_str: &str) -> Result<(), GovernanceError> {
        let deadline = Instant::now() + LOCK_TIMEOUT;
        let mut attempts = 0u32;
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => return Ok(()),
                Err(_) if attempts < LOCK_RETRY_CEILING && Instant::now() < deadline => {
                    attempts += 1;
                    std::thread::sleep(Duration::from_millis(100));
                }
                Err(_) => {
                    return Err(GovernanceError::LockTimeout {
                        path: path_str.to_string(),
                    })
                }
            }
        }
    }
}

fn read_state_locked(file: &mut File, path_str: &str) -> Result<GovernanceState, GovernanceError> {
    file.seek(SeekFrom::Start(0))
        .map_err(|source| GovernanceError::StateIo {
            path: path_str.to_string(),
            source,
        })?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)
        .map_err(|source| GovernanceError::StateIo {
            path: path_str.to_string(),
            source,
        })?;
    if contents.trim().is_empty() {
        return Ok(GovernanceState::default());
    }
    serde_json::from_str(&contents).map_err(|e| GovernanceError::StateCorrupted {
        path: path_str.to_string(),
        detail: e.to_string(),
    })
}

fn write_state_locked(
    file: &mut File,
    state: &GovernanceState,
    path_str: &str,
) -> Result<(), GovernanceError> {
    let bytes = serde_json::to_vec_pretty(state).expect("GovernanceState always serialises");
    file.seek(SeekFrom::Start(0))
        .map_err(|source| GovernanceError::StateIo {
            path: path_str.to_string(),
            source,
        })?;
    file.set_len(0).map_err(|source| GovernanceError::StateIo {
        path: path_str.to_string(),
        source,
    })?;
    file.write_all(&bytes).map_err(|source| GovernanceError::StateIo {
        path: path_str.to_string(),
        source,
    })?;
    file.sync_all().map_err(|source| GovernanceError::StateIo {
        path: path_str.to_string(),
        source,
    })
}

/// Load governance state best-effort on startup when the state file is
/// corrupted: returns an empty, already-frozen state rather than failing
/// to start. §7: "startup continues in FROZEN".
#[must_use]
pub fn frozen_fallback_state(reason: &str) -> GovernanceState {
    GovernanceState {
        freeze: FreezeState {
            is_frozen: true,
            frozen_at: Some(Utc::now()),
            frozen_by: Some("governance-store".to_string()),
            freeze_reason: Some(reason.to_string()),
            ..Default::default()
        },
        budget: SafetyBudgetState {
            is_frozen: true,
            freeze_reason: Some(reason.to_string()),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Convenience: does `path` look like it is on a network filesystem we
/// should warn about? Best-effort heuristic, not exhaustive.
#[must_use]
pub fn path_display(path: &Path) -> String {
    path.display().to_string()
}
