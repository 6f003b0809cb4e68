//! Image transform pipeline.
//!
//! # Data Flow
//! ```text
//! RawParams
//!     → params.rs  (TransformRequest::validate)
//!     → format.rs  (resolve_format + allow-list)
//!     → execute.rs (fetch.rs stream ∥ engine/, under a deadline)
//!     → TransformResult
//! ```
//!
//! # Design Decisions
//! - Fetcher and engine are traits; the pipeline is generic over both
//! - The pipeline is immutable once built; config reload swaps whole pipelines

pub mod engine;
pub mod execute;
pub mod fetch;
pub mod format;
pub mod params;

use thiserror::Error;

use crate::resilience::DeadlineExceeded;
use crate::validation::ValidationError;

pub use engine::{EngineError, ImageEngine, RasterEngine, TransformResult};
pub use execute::{DefaultPipeline, PipelineLimits, TransformPipeline};
pub use fetch::{FetchError, HttpSourceFetcher, SourceFetcher};
pub use params::TransformRequest;

/// Why a transform operation failed.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Deadline(#[from] DeadlineExceeded),

    #[error("{0}")]
    Internal(String),
}
