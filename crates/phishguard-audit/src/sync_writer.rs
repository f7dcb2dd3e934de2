//! Synchronous append-only writer for governance-critical events
//! (overrides, manifest changes, invariant violations).
//!
//! Each append takes the file's exclusive advisory lock for the whole
//! `open → lock → write → fsync → unlock` cycle. Failure is raised to the
//! caller rather than swallowed — governance does not proceed on a failed
//! audit write.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs2::FileExt;
use phishguard_core::types::AuditEntry;

use crate::error::AuditError;

/// Lock acquisition timeout for the synchronous writer.
const LOCK_TIMEOUT: Duration = Duration::from_secs(5);
const LOCK_RETRY_SLEEP: Duration = Duration::from_millis(20);

/// Writes [`AuditEntry`] records to `audit/policy_override.log`: lines
/// alternate a human summary and a `JSON: {...}` payload.
pub struct SyncAuditWriter {
    path: PathBuf,
}

impl SyncAuditWriter {
    /// Construct a writer for the given log file path. The parent
    /// directory must already exist.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Append one entry, under the file's exclusive lock, fsync'd before
    /// the lock is released.
    pub fn append(&self, entry: &AuditEntry) -> Result<(), AuditError> {
        let path_str = self.path.display().to_string();

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| AuditError::Open {
                path: path_str.clone(),
                source,
            })?;

        self.acquire_exclusive(&file, &path_str)?;

        let result = (|| -> std::io::Result<()> {
            let summary = format!(
                "{} | {} | {} | {}",
                entry.timestamp.to_rfc3339(),
                entry.event_type,
                entry.affected_domains.join(","),
                entry.reason,
            );
            let payload = serde_json::to_string(entry).unwrap_or_else(|_| "{}".to_string());
            writeln!(file, "{summary}")?;
            writeln!(file, "JSON: {payload}")?;
            file.sync_all()
        })();

        let _ = fs2::FileExt::unlock(&file);

        result.map_err(|source| AuditError::Write {
            path: path_str,
            source,
        })
    }

    fn acquire_exclusive(&self, file: &std::fs::File, path_str: &str) -> Result<(), AuditError> {
        let deadline = Instant::now() + LOCK_TIMEOUT;
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => return Ok(()),
                Err(_) if Instant::now() < deadline => {
                    std::thread::sleep(LOCK_RETRY_SLEEP);
                }
                Err(_) => {
                    return Err(AuditError::LockTimeout {
                        path: path_str.to_string(),
                    })
                }
            }
        }
    }
}

/// `true` if `path`'s parent directory exists, creating it if not. Used by
/// callers wiring up the audit directory at process init.
pub fn ensure_parent_dir(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use phishguard_core::types::Environment;

    fn sample_entry() -> AuditEntry {
        AuditEntry {
            timestamp: chrono::Utc::now(),
            environment: Environment::Local,
            event_type: "ALLOWLIST_MODIFICATION".to_string(),
            override_flag_value: None,
            affected_domains: vec!["example.com".to_string()],
            triggering_context: "test".to_string(),
            reason: "unit test".to_string(),
            additional_data: serde_json::json!({}),
        }
    }

    #[test]
    fn append_writes_summary_and_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy_override.log");
        let writer = SyncAuditWriter::new(&path);
        writer.append(&sample_entry()).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("ALLOWLIST_MODIFICATION"));
        assert!(lines[1].starts_with("JSON: "));
    }

    #[test]
    fn repeated_appends_accumulate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy_override.log");
        let writer = SyncAuditWriter::new(&path);
        writer.append(&sample_entry()).unwrap();
        writer.append(&sample_entry()).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 4);
    }
}
