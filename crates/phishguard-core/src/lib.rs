//! Data model, registered-domain parsing, the trusted-domain gate, and
//! policy configuration shared across the PhishGuard workspace.

pub mod config;
pub mod domain;
pub mod error;
pub mod trust;
pub mod types;

pub mod prelude {
    //! Common imports for downstream crates.
    pub use crate::config::{ConfigError, GovernancePolicy, PipelinePolicy, PolicyBuilder, SecurityPolicy};
    pub use crate::domain::{self, RegisteredDomain};
    pub use crate::error::{TrustGateError, UrlError};
    pub use crate::trust::{
        AlwaysPermitted, AlwaysUnfrozen, CalibrationGate, FreezeQuery, TrustCheck, TrustGate,
        TrustManifest,
    };
    pub use crate::types::*;
}
