//! Transform request parameters.
//!
//! Options are designed to fit into a query string: every field is a flat
//! scalar, so a request can be rebuilt from `to_query_string()` output.

use std::fmt;
use std::str::FromStr;

use url::form_urlencoded;

use crate::validation::{Coercer, RawParams, ValidationError};

/// Name reported in validation errors.
pub const OBJECT_NAME: &str = "ImageTransformOptions";

/// How a source aspect ratio is reconciled with the requested box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fit {
    Contain,
    Cover,
    Fill,
    Inside,
    Outside,
}

impl Fit {
    pub const ALL: [&'static str; 5] = ["contain", "cover", "fill", "inside", "outside"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Fit::Contain => "contain",
            Fit::Cover => "cover",
            Fit::Fill => "fill",
            Fit::Inside => "inside",
            Fit::Outside => "outside",
        }
    }
}

impl FromStr for Fit {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "contain" => Ok(Fit::Contain),
            "cover" => Ok(Fit::Cover),
            "fill" => Ok(Fit::Fill),
            "inside" => Ok(Fit::Inside),
            "outside" => Ok(Fit::Outside),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Fit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Crop anchor used when `cover` has to cut part of the image away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Position {
    #[default]
    Center,
    /// Keep the region with the most luminance information.
    Entropy,
    /// Keep the most salient region (saturation and edges).
    Attention,
}

impl Position {
    pub const ALL: [&'static str; 3] = ["center", "entropy", "attention"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Position::Center => "center",
            Position::Entropy => "entropy",
            Position::Attention => "attention",
        }
    }
}

impl FromStr for Position {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "center" => Ok(Position::Center),
            "entropy" => Ok(Position::Entropy),
            "attention" => Ok(Position::Attention),
            _ => Err(()),
        }
    }
}

/// Validated input of a transform operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformRequest {
    /// Image is downloaded from there. Only checked for presence here.
    pub source_image_url: String,
    /// Output format name or `auto`. When absent the URL suffix is used.
    pub format: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fit: Option<Fit>,
    pub position: Position,
    /// Allowed difference from the top-left pixel when trimming borders.
    pub trim: Option<u32>,
    pub quality: u8,
    pub lossless: bool,
    /// AVIF: 1 (slowest/smallest) to 8 (fastest/largest).
    pub speed: Option<u8>,
    /// WEBP: CPU effort 0-6.
    pub reduction_effort: Option<u8>,
    /// PNG: zlib level 0-9.
    pub compression_level: Option<u8>,
    /// PNG: reduce to a palette-based image.
    pub palette: Option<bool>,
}

impl TransformRequest {
    pub const DEFAULT_QUALITY: u8 = 100;

    /// Request with every option at its default.
    pub fn new(source_image_url: impl Into<String>) -> Self {
        Self {
            source_image_url: source_image_url.into(),
            format: None,
            width: None,
            height: None,
            fit: None,
            position: Position::Center,
            trim: None,
            quality: Self::DEFAULT_QUALITY,
            lossless: false,
            speed: None,
            reduction_effort: None,
            compression_level: None,
            palette: None,
        }
    }

    /// Coerce and validate raw query parameters.
    pub fn validate(raw: &RawParams) -> Result<Self, ValidationError> {
        let mut c = Coercer::new(OBJECT_NAME, raw);

        let source_image_url = c.required_string("sourceImageUrl");
        let format = c.string("format");
        let width = c.integer("width", 1, None);
        let height = c.integer("height", 1, None);
        let fit = c.one_of("fit", &Fit::ALL);
        let position = c.one_of("position", &Position::ALL);
        let trim = c.integer("trim", 1, None);
        let quality = c.integer("quality", 1, Some(100));
        let lossless = c.boolean("lossless");
        let speed = c.integer("speed", 1, Some(8));
        let reduction_effort = c.integer("reductionEffort", 0, Some(6));
        let compression_level = c.integer("compressionLevel", 0, Some(9));
        let palette = c.boolean("palette");

        c.finish()?;

        Ok(Self {
            // presence was checked by `required_string`
            source_image_url: source_image_url.unwrap_or_default(),
            format,
            width,
            height,
            fit,
            position: position.unwrap_or_default(),
            trim,
            quality: quality.unwrap_or(Self::DEFAULT_QUALITY),
            lossless: lossless.unwrap_or(false),
            speed,
            reduction_effort,
            compression_level,
            palette,
        })
    }

    /// Whether a resize stage is needed.
    pub fn resizes(&self) -> bool {
        self.width.is_some() || self.height.is_some()
    }

    /// Serialize back into a query string accepted by [`TransformRequest::validate`].
    pub fn to_query_string(&self) -> String {
        let mut query = form_urlencoded::Serializer::new(String::new());
        query.append_pair("sourceImageUrl", &self.source_image_url);

        let mut put = |key: &str, value: Option<String>| {
            if let Some(value) = value {
                query.append_pair(key, &value);
            }
        };
        put("format", self.format.clone());
        put("width", self.width.map(|v| v.to_string()));
        put("height", self.height.map(|v| v.to_string()));
        put("fit", self.fit.map(|v| v.as_str().to_string()));
        put("position", Some(self.position.as_str().to_string()));
        put("trim", self.trim.map(|v| v.to_string()));
        put("quality", Some(self.quality.to_string()));
        put("lossless", Some(self.lossless.to_string()));
        put("speed", self.speed.map(|v| v.to_string()));
        put("reductionEffort", self.reduction_effort.map(|v| v.to_string()));
        put("compressionLevel", self.compression_level.map(|v| v.to_string()));
        put("palette", self.palette.map(|v| v.to_string()));

        query.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validate(pairs: &[(&str, &str)]) -> Result<TransformRequest, ValidationError> {
        TransformRequest::validate(&RawParams::from_pairs(pairs.iter().copied()))
    }

    const SRC: (&str, &str) = ("sourceImageUrl", "https://example.com/a.png");

    #[test]
    fn test_defaults() {
        let req = validate(&[SRC]).unwrap();
        assert_eq!(req, TransformRequest::new("https://example.com/a.png"));
        assert_eq!(req.quality, 100);
        assert!(!req.lossless);
        assert_eq!(req.position, Position::Center);
        assert!(!req.resizes());
    }

    #[test]
    fn test_quality_range() {
        let err = validate(&[SRC, ("quality", "150")]).unwrap_err();
        assert!(err.has_field("quality"));

        let req = validate(&[SRC, ("quality", "50")]).unwrap();
        assert_eq!(req.quality, 50);
    }

    #[test]
    fn test_source_url_is_required_but_not_parsed() {
        let err = validate(&[("width", "10")]).unwrap_err();
        assert!(err.has_field("sourceImageUrl"));

        let req = validate(&[("sourceImageUrl", "not a url")]).unwrap();
        assert_eq!(req.source_image_url, "not a url");
    }

    #[test]
    fn test_dimensions_must_be_positive() {
        let err = validate(&[SRC, ("width", "0"), ("height", "-5")]).unwrap_err();
        assert!(err.has_field("width"));
        assert!(err.has_field("height"));

        let req = validate(&[SRC, ("width", "1")]).unwrap();
        assert_eq!(req.width, Some(1));
        assert!(req.resizes());
    }

    #[test]
    fn test_enums() {
        let req = validate(&[SRC, ("fit", "inside"), ("position", "entropy")]).unwrap();
        assert_eq!(req.fit, Some(Fit::Inside));
        assert_eq!(req.position, Position::Entropy);

        let err = validate(&[SRC, ("fit", "stretch"), ("position", "Center")]).unwrap_err();
        assert!(err.has_field("fit"));
        assert!(err.has_field("position"));
    }

    #[test]
    fn test_encoder_option_ranges() {
        let err = validate(&[
            SRC,
            ("speed", "0"),
            ("reductionEffort", "7"),
            ("compressionLevel", "10"),
            ("trim", "0"),
        ])
        .unwrap_err();
        assert_eq!(err.errors.len(), 4);

        let req = validate(&[
            SRC,
            ("speed", "8"),
            ("reductionEffort", "0"),
            ("compressionLevel", "9"),
            ("palette", "true"),
            ("lossless", "true"),
        ])
        .unwrap();
        assert_eq!(req.speed, Some(8));
        assert_eq!(req.reduction_effort, Some(0));
        assert_eq!(req.compression_level, Some(9));
        assert_eq!(req.palette, Some(true));
        assert!(req.lossless);
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        assert!(validate(&[SRC, ("utm_source", "newsletter")]).is_ok());
    }

    #[test]
    fn test_query_string_is_accepted_back() {
        let mut req = TransformRequest::new("https://example.com/a b.png?x=1&y=2");
        req.format = Some("auto".into());
        req.width = Some(320);
        req.fit = Some(Fit::Cover);
        req.position = Position::Attention;
        req.trim = Some(12);
        req.quality = 80;
        req.palette = Some(false);

        let raw = RawParams::from_pairs(
            form_urlencoded::parse(req.to_query_string().as_bytes()).into_owned(),
        );
        assert_eq!(TransformRequest::validate(&raw).unwrap(), req);
    }
}
