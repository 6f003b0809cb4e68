//! Image engine capability.
//!
//! # Data Flow
//! ```text
//! source bytes
//!     → decode (tolerant, limit-checked)
//!     → trim      (only with a threshold)
//!     → resize    (only with width or height; geometry.rs + crop.rs)
//!     → encode    (resolved format, encoder options)
//!     → TransformResult
//! ```
//!
//! The pipeline only talks to [`ImageEngine`]; [`RasterEngine`] binds it to
//! the `image` crate.

pub mod crop;
pub mod geometry;
pub mod raster;

use thiserror::Error;

use crate::pipeline::format::OutputFormat;
use crate::pipeline::params::{Fit, Position, TransformRequest};

pub use raster::RasterEngine;

/// Errors raised by an image engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Source bytes are not a decodable image.
    #[error("cannot decode source image: {0}")]
    Decode(String),

    /// Source or output exceeds configured limits.
    #[error("image limits exceeded: {0}")]
    LimitExceeded(String),

    /// Encoding failed inside the codec.
    #[error("cannot encode image: {0}")]
    Encode(String),
}

/// A decoded image plus the format it was decoded from.
#[derive(Debug)]
pub struct Decoded<I> {
    pub image: I,
    /// Input format, when the engine can also encode it.
    pub format: Option<OutputFormat>,
}

/// Resize stage settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeSpec {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fit: Fit,
    pub position: Position,
}

/// Encode stage settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOptions {
    /// Explicit output format; `None` keeps the input format.
    pub format: Option<OutputFormat>,
    pub quality: u8,
    pub lossless: bool,
    pub speed: Option<u8>,
    pub reduction_effort: Option<u8>,
    pub compression_level: Option<u8>,
    pub palette: Option<bool>,
}

/// Everything the engine needs for one request, in stage order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformPlan {
    pub trim: Option<u32>,
    pub resize: Option<ResizeSpec>,
    pub encode: EncodeOptions,
}

impl TransformPlan {
    pub fn new(request: &TransformRequest, format: Option<OutputFormat>) -> Self {
        let resize = request.resizes().then(|| ResizeSpec {
            width: request.width,
            height: request.height,
            fit: request.fit.unwrap_or(Fit::Cover),
            position: request.position,
        });

        Self {
            trim: request.trim,
            resize,
            encode: EncodeOptions {
                format,
                quality: request.quality,
                lossless: request.lossless,
                speed: request.speed,
                reduction_effort: request.reduction_effort,
                compression_level: request.compression_level,
                palette: request.palette,
            },
        }
    }
}

/// Output of a successful transform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformResult {
    pub data: Vec<u8>,
    /// Engine name of the produced format.
    pub format: Option<String>,
    pub width: u32,
    pub height: u32,
    pub channels: u8,
}

impl TransformResult {
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// Decode, transform and encode capability.
pub trait ImageEngine: Send + Sync + 'static {
    /// The engine's in-memory image.
    type Image: Send;

    fn decode(&self, source: &[u8]) -> Result<Decoded<Self::Image>, EngineError>;

    fn trim(&self, image: Self::Image, threshold: u32) -> Result<Self::Image, EngineError>;

    fn resize(&self, image: Self::Image, spec: &ResizeSpec) -> Result<Self::Image, EngineError>;

    fn encode(
        &self,
        image: Self::Image,
        input_format: Option<OutputFormat>,
        options: &EncodeOptions,
    ) -> Result<TransformResult, EngineError>;

    /// Run every stage of `plan`, decoding and encoding exactly once.
    fn run(&self, source: &[u8], plan: &TransformPlan) -> Result<TransformResult, EngineError> {
        let Decoded { mut image, format } = self.decode(source)?;

        if let Some(threshold) = plan.trim {
            image = self.trim(image, threshold)?;
        }
        if let Some(spec) = &plan.resize {
            image = self.resize(image, spec)?;
        }

        self.encode(image, format, &plan.encode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_skips_optional_stages() {
        let request = TransformRequest::new("https://example.com/a.png");
        let plan = TransformPlan::new(&request, None);
        assert_eq!(plan.trim, None);
        assert_eq!(plan.resize, None);
        assert_eq!(plan.encode.quality, 100);
    }

    #[test]
    fn test_plan_defaults_fit_to_cover() {
        let mut request = TransformRequest::new("https://example.com/a.png");
        request.height = Some(40);
        request.trim = Some(5);

        let plan = TransformPlan::new(&request, Some(OutputFormat::WebP));
        let resize = plan.resize.unwrap();
        assert_eq!(resize.fit, Fit::Cover);
        assert_eq!(resize.width, None);
        assert_eq!(resize.height, Some(40));
        assert_eq!(plan.trim, Some(5));
        assert_eq!(plan.encode.format, Some(OutputFormat::WebP));
    }
}
