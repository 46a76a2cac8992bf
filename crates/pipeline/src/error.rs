//! Pipeline error types
//!
//! The collector loop itself never fails: malformed lines and persistence
//! failures are logged and counted. These errors come from setting the
//! loop's endpoints up.

use thiserror::Error;

/// Pipeline errors
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Request endpoint could not be started
    #[error("request endpoint: {0}")]
    Source(#[from] linecast_sources::SourceError),

    /// Publish endpoint could not be started
    #[error("publish endpoint: {0}")]
    Tap(#[from] linecast_tap::TapError),

    /// Neither a request endpoint nor an upstream subscription is set up
    #[error("collector has no input")]
    NoInput,
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;
