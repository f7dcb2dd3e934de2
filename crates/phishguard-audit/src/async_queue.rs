//! Asynchronous queue for high-volume per-request XAI audit records.
//!
//! A producer enqueues non-blocking onto an unbounded [`flume`] channel; a
//! dedicated single consumer task drains it to a [`RotatingWriter`].
//! Enqueue failure is swallowed — this path must never block or crash the
//! request path (spec §4.13).

use std::path::PathBuf;

use serde::Serialize;
use tokio::sync::oneshot;
use tokio::task::{self, JoinHandle};
use tracing::warn;

use crate::rotation::RotatingWriter;

/// One top-3-features XAI record for a single decision.
#[derive(Debug, Clone, Serialize)]
pub struct XaiRecord {
    /// Timestamp of the decision, RFC 3339.
    pub timestamp: String,
    /// The URL analysed.
    pub url: String,
    /// Final verdict, as its canonical string tag.
    pub verdict: String,
    /// Top contributing signal names, at most 3.
    pub top_signals: Vec<String>,
}

/// Handle to the running consumer task. Dropping this without calling
/// [`XaiAuditQueue::shutdown`] leaves the task running — callers should
/// shut it down explicitly at process exit.
pub struct XaiAuditQueue {
    sender: flume::Sender<XaiRecord>,
    shutdown: Option<oneshot::Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl XaiAuditQueue {
    /// Start the consumer task writing to `path`.
    pub fn start(path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let path = path.into();
        let mut writer = RotatingWriter::new(path)?;
        let (sender, receiver) = flume::unbounded::<XaiRecord>();
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        let worker = task::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = &mut shutdown_rx => break,
                    recv = receiver.recv_async() => {
                        match recv {
                            Ok(record) => {
                                let line = serde_json::to_string(&record).unwrap_or_else(|_| "{}".to_string());
                                if let Err(err) = writer.write_line(&line) {
                                    warn!(error = %err, "xai audit write failed; counters may lag");
                                }
                            }
                            Err(_) => break,
                        }
                    }
                }
            }
            // Drain whatever remains after shutdown is signalled, best-effort.
            while let Ok(record) = receiver.try_recv() {
                let line = serde_json::to_string(&record).unwrap_or_else(|_| "{}".to_string());
                let _ = writer.write_line(&line);
            }
        });

        Ok(Self {
            sender,
            shutdown: Some(shutdown_tx),
            worker: Some(worker),
        })
    }

    /// Enqueue a record, non-blocking. Failure (queue consumer gone) is
    /// swallowed and logged — never propagated to the request path.
    pub fn enqueue(&self, record: XaiRecord) {
        if self.sender.send(record).is_err() {
            warn!("xai audit queue consumer is gone; dropping record");
        }
    }

    /// Signal the consumer to stop and wait for it to drain and exit.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.worker.take() {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn enqueued_records_are_flushed_on_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("xai_telemetry.jsonl");
        let queue = XaiAuditQueue::start(&path).unwrap();

        queue.enqueue(XaiRecord {
            timestamp: chrono::Utc::now().to_rfc3339(),
            url: "https://example.com".to_string(),
            verdict: "SAFE".to_string(),
            top_signals: vec!["ip_literal_host".to_string()],
        });

        queue.shutdown().await;

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("example.com"));
    }

    #[tokio::test]
    async fn enqueue_after_shutdown_does_not_panic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("xai_telemetry.jsonl");
        let queue = XaiAuditQueue::start(&path).unwrap();
        queue.shutdown().await;
        // sender is dropped along with queue; nothing further to assert
        // beyond "this does not panic".
    }
}
