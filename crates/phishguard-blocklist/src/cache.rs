//! Blocklist Cache (C3): two membership sets refreshed from a fixed source
//! table, swapped atomically under an exclusive lock.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use phishguard_core::domain;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::warn;

use crate::error::BlocklistError;
use crate::source::{self, BlocklistSource, FETCH_TIMEOUT, GLOBAL_REFRESH_INTERVAL};

/// Outcome of a membership check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlocklistResult {
    /// Whether the URL matched an exact or registered-domain blocklist entry.
    pub is_blocked: bool,
    /// Name of the matching source.
    pub source: Option<String>,
    /// The exact URL matched, if the match was at URL granularity.
    pub matched_url: Option<String>,
    /// The registered domain matched, if the match was at domain granularity.
    pub matched_domain: Option<String>,
    /// Confidence: 0.99 for an exact URL match, 0.85 for domain-only.
    pub confidence: f64,
}

impl BlocklistResult {
    fn not_blocked() -> Self {
        Self {
            is_blocked: false,
            source: None,
            matched_url: None,
            matched_domain: None,
            confidence: 0.0,
        }
    }
}

/// An immutable point-in-time view of the blocklist, swapped in as a unit.
#[derive(Debug, Default)]
struct Snapshot {
    blocked_urls: HashSet<String>,
    blocked_domains: HashSet<String>,
}

/// Fetches and exposes blocklist membership, refreshing on a timer.
///
/// Readers (`check`) take a shared lock; a refresh builds the next
/// snapshot locally from scratch, then swaps the pointer under an
/// exclusive lock — the swap itself is the only moment readers could
/// block, and it is a pointer assignment, not a rebuild.
pub struct BlocklistCache {
    snapshot: RwLock<Arc<Snapshot>>,
    last_refresh: RwLock<Option<Instant>>,
    client: reqwest::Client,
    refresh_interval: Duration,
}

impl Default for BlocklistCache {
    fn default() -> Self {
        Self::new()
    }
}

impl BlocklistCache {
    /// Construct an empty cache; callers should `refresh` before serving
    /// traffic, though `check` will trigger a refresh itself if stale.
    #[must_use]
    pub fn new() -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(Snapshot::default())),
            last_refresh: RwLock::new(None),
            client: reqwest::Client::builder()
                .timeout(FETCH_TIMEOUT)
                .build()
                .expect("reqwest client builder should not fail with static config"),
            refresh_interval: GLOBAL_REFRESH_INTERVAL,
        }
    }

    /// `check(url) → BlocklistResult`. Refreshes first if stale.
    pub async fn check(&self, url: &str) -> BlocklistResult {
        if self.is_stale().await {
            if let Err(err) = self.refresh().await {
                warn!(error = %err, "blocklist refresh failed; serving existing snapshot");
            }
        }
        self.check_against_current(url).await
    }

    /// Check membership against whatever snapshot is currently loaded,
    /// without triggering a refresh. Exposed for tests and for callers
    /// that manage their own refresh cadence.
    pub async fn check_against_current(&self, url: &str) -> BlocklistResult {
        let normalized = domain::normalize(url);
        let registered = domain::extract(&normalized);

        let snapshot = self.snapshot.read().await.clone();

        if snapshot.blocked_urls.contains(&normalized) {
            return BlocklistResult {
                is_blocked: true,
                source: Some("blocklist".to_string()),
                matched_url: Some(normalized),
                matched_domain: None,
                confidence: 0.99,
            };
        }

        if !registered.is_empty() && snapshot.blocked_domains.contains(registered.as_str()) {
            return BlocklistResult {
                is_blocked: true,
                source: Some("blocklist".to_string()),
                matched_url: None,
                matched_domain: Some(registered.as_str().to_string()),
                confidence: 0.85,
            };
        }

        BlocklistResult::not_blocked()
    }

    async fn is_stale(&self) -> bool {
        match *self.last_refresh.read().await {
            None => true,
            Some(last) => last.elapsed() > self.refresh_interval,
        }
    }

    /// Fetch every source with a per-source timeout, build the next
    /// snapshot locally, then swap it in under the exclusive lock.
    /// Sources that fail drop out of the new snapshot; the cache as a
    /// whole stays available as long as at least one source succeeds.
    pub async fn refresh(&self) -> Result<(), BlocklistError> {
        let sources = source::sources();
        let mut blocked_urls = HashSet::new();
        let mut blocked_domains = HashSet::new();
        let mut failures = 0usize;

        for src in sources {
            match self.fetch_one(src).await {
                Ok(entries) => {
                    for entry in entries {
                        let normalized = domain::normalize(&entry);
                        let registered = domain::extract(&normalized);
                        blocked_urls.insert(normalized);
                        if !registered.is_empty() {
                            blocked_domains.insert(registered.as_str().to_string());
                        }
                    }
                }
                Err(err) => {
                    failures += 1;
                    warn!(source = src.name, error = %err, "blocklist source failed; dropping its contribution");
                }
            }
        }

        if failures == sources.len() {
            return Err(BlocklistError::AllSourcesFailed { count: sources.len() });
        }

        let next = Arc::new(Snapshot {
            blocked_urls,
            blocked_domains,
        });
        {
            let mut guard = self.snapshot.write().await;
            *guard = next;
        }
        *self.last_refresh.write().await = Some(Instant::now());
        Ok(())
    }

    async fn fetch_one(&self, src: &BlocklistSource) -> Result<Vec<String>, BlocklistError> {
        let response = self
            .client
            .get(src.fetch_url)
            .send()
            .await
            .map_err(|e| BlocklistError::SourceFailed {
                source_name: src.name.to_string(),
                detail: e.to_string(),
            })?;
        let body = response
            .text()
            .await
            .map_err(|e| BlocklistError::SourceFailed {
                source_name: src.name.to_string(),
                detail: e.to_string(),
            })?;
        Ok(source::parse_body(&body, src.format))
    }

    /// Directly seed the cache's current snapshot, bypassing network
    /// fetch — used by tests and by offline/air-gapped deployments.
    pub async fn seed(&self, blocked_urls: HashSet<String>, blocked_domains: HashSet<String>) {
        let next = Arc::new(Snapshot {
            blocked_urls,
            blocked_domains,
        });
        *self.snapshot.write().await = next;
        *self.last_refresh.write().await = Some(Instant::now());
    }
}
