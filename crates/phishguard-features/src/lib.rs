//! Feature Extractor interface (C4) and a heuristic reference implementation.

pub mod error;
pub mod extractor;
pub mod heuristic;
pub mod signals;
pub mod ssrf;

pub mod prelude {
    //! Common imports for downstream crates.
    pub use crate::error::InvalidUrlError;
    pub use crate::extractor::{ExtractorExplanations, FeatureExtractor, SignalExplanation, ValidatedUrl};
    pub use crate::heuristic::HeuristicExtractor;
    pub use crate::signals::{AlwaysFailProbe, DnsProbe, HttpProbe, WhoisProbe};
}
