//! Decision Pipeline (C6) and Analysis Cache (C10): the workspace's
//! per-request orchestration point over every other crate.

pub mod cache;
pub mod drift;
pub mod error;
pub mod executor;

pub mod prelude {
    //! Common imports for downstream crates.
    pub use crate::cache::AnalysisCache;
    pub use crate::error::PipelineError;
    pub use crate::executor::{DefaultExtractorFactory, ExtractorFactory, Pipeline};
}
