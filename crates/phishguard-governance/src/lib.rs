//! Fail-closed governance controller (C7), calibration monitor (C11), and
//! invariant reporter (C12).
//!
//! Every mutating operation in this crate routes through
//! [`store::GovernanceStore::update`], the sole write path over the single
//! combined `governance_state.json` document. Nothing here keeps a
//! mutable global; [`controller::GovernanceController`] is the one handle
//! callers construct at process init and share.

pub mod budget;
pub mod calibration;
pub mod canary;
pub mod controller;
pub mod error;
pub mod freeze;
pub mod invariant;
pub mod overrides;
pub mod store;

pub mod prelude {
    //! Common imports for downstream crates.
    pub use crate::calibration::{CalibrationMetrics, CalibrationMonitor, CalibrationSample, PolicyAdjustment};
    pub use crate::controller::GovernanceController;
    pub use crate::error::GovernanceError;
    pub use crate::overrides::OverrideRequest;
    pub use crate::store::{GovernanceState, GovernanceStore};
}
