//! Audit Log subsystem (C8): synchronous governance-critical append and
//! asynchronous high-volume XAI telemetry queue.

pub mod async_queue;
pub mod error;
pub mod rotation;
pub mod sync_writer;

pub mod prelude {
    //! Common imports for downstream crates.
    pub use crate::async_queue::{XaiAuditQueue, XaiRecord};
    pub use crate::error::AuditError;
    pub use crate::rotation::RotatingWriter;
    pub use crate::sync_writer::{ensure_parent_dir, SyncAuditWriter};
}
