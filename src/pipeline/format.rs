//! Output format negotiation.
//!
//! # Responsibilities
//! - Resolve the `auto` sentinel from the Accept header (AVIF, then WebP)
//! - Derive an unset format from the source URL suffix
//! - Check resolved names against the encodable allow-list
//! - Map engine format names to response content types
//!
//! # Design Decisions
//! - The URL suffix is a plain string heuristic: case is preserved, nothing is
//!   sniffed, query strings are not stripped. The allow-list check afterwards
//!   turns an unusable suffix into a validation error.

use std::fmt;

/// Sentinel asking the service to pick a format from the Accept header.
pub const AUTO: &str = "auto";

/// Resolve the requested format name.
///
/// Returns `None` when the engine should keep the input format.
pub fn resolve_format(requested: Option<&str>, accept: &str, source_url: &str) -> Option<String> {
    match requested {
        Some(AUTO) => {
            if accept.contains("image/avif") {
                Some("avif".to_string())
            } else if accept.contains("image/webp") {
                Some("webp".to_string())
            } else {
                None
            }
        }
        Some(format) if !format.is_empty() => Some(format.to_string()),
        _ => substring_after_last(source_url, '.').map(str::to_string),
    }
}

fn substring_after_last(s: &str, delimiter: char) -> Option<&str> {
    s.rsplit_once(delimiter).map(|(_, suffix)| suffix)
}

/// Formats the engine can encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    Jpeg,
    Png,
    WebP,
    Avif,
    Gif,
    Tiff,
}

impl OutputFormat {
    /// Parse an extension-style name, case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "webp" => Some(Self::WebP),
            "avif" | "heif" => Some(Self::Avif),
            "gif" => Some(Self::Gif),
            "tiff" | "tif" => Some(Self::Tiff),
            _ => None,
        }
    }

    /// Canonical lowercase name, as reported in results.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::WebP => "webp",
            Self::Avif => "avif",
            Self::Gif => "gif",
            Self::Tiff => "tiff",
        }
    }

    pub fn content_type(&self) -> String {
        content_type_for(Some(self.name()))
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Content type for an engine-reported format name.
///
/// `heif` is presented as `avif`; a missing or empty name falls back to JPEG.
pub fn content_type_for(format: Option<&str>) -> String {
    let name = match format {
        Some("heif") => "avif",
        Some(name) if !name.is_empty() => name,
        _ => "jpeg",
    };
    format!("image/{}", name)
}
