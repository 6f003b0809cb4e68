//! [`ImageEngine`] backed by the `image` crate.
//!
//! # Design Decisions
//! - Source dimensions are read from the header and checked against the pixel
//!   limit before the full decode allocates anything
//! - Decoding keeps the codecs' lenient defaults; only unrecoverable errors fail
//! - Resampling uses Lanczos3; `contain` letterboxes on opaque black
//! - WebP output is lossless (the codec has no lossy mode)
//! - PNG and TIFF keep 16-bit sources at 16 bits
//! - PNG palette reduction is a lossless oxipng pass, so it only shrinks
//!   images that already fit in a palette

use std::io::Cursor;

use image::codecs::avif::AvifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::codecs::webp::WebPEncoder;
use image::imageops::{self, FilterType};
use image::{
    ColorType, DynamicImage, ImageBuffer, ImageError, ImageFormat, ImageReader, Rgba, RgbaImage,
};

use super::crop::crop_origin;
use super::geometry::{layout, ResizeLayout};
use super::{Decoded, EncodeOptions, EngineError, ImageEngine, ResizeSpec, TransformResult};
use crate::config::TransformConfig;
use crate::pipeline::format::OutputFormat;
use crate::pipeline::params::Position;

/// AVIF encoder speed when none is requested.
const DEFAULT_AVIF_SPEED: u8 = 5;

/// PNG compression level when none is requested.
const DEFAULT_PNG_COMPRESSION: u8 = 6;

/// Background of `contain` letterboxing.
const PAD_BACKGROUND: Rgba<u8> = Rgba([0, 0, 0, 255]);
const PAD_BACKGROUND_16: Rgba<u16> = Rgba([0, 0, 0, u16::MAX]);

#[derive(Debug, Clone)]
pub struct RasterEngine {
    max_input_pixels: u64,
    max_output_dimension: u32,
}

impl RasterEngine {
    pub fn new(config: &TransformConfig) -> Self {
        Self {
            max_input_pixels: config.max_input_pixels,
            max_output_dimension: config.max_output_dimension,
        }
    }

    fn reader(source: &[u8]) -> Result<ImageReader<Cursor<&[u8]>>, EngineError> {
        ImageReader::new(Cursor::new(source))
            .with_guessed_format()
            .map_err(|e| EngineError::Decode(e.to_string()))
    }

    fn check_output(&self, width: u32, height: u32) -> Result<(), EngineError> {
        let max = self.max_output_dimension;
        if width > max || height > max {
            return Err(EngineError::LimitExceeded(format!(
                "output {}x{} exceeds maximum dimension {}",
                width, height, max
            )));
        }
        Ok(())
    }
}

impl Default for RasterEngine {
    fn default() -> Self {
        Self::new(&TransformConfig::default())
    }
}

fn decode_error(e: ImageError) -> EngineError {
    match e {
        ImageError::Limits(limit) => EngineError::LimitExceeded(limit.to_string()),
        other => EngineError::Decode(other.to_string()),
    }
}

fn encode_error(format: OutputFormat) -> impl Fn(ImageError) -> EngineError {
    move |e| EngineError::Encode(format!("{} encode failed: {}", format, e))
}

fn encodable(format: ImageFormat) -> Option<OutputFormat> {
    match format {
        ImageFormat::Jpeg => Some(OutputFormat::Jpeg),
        ImageFormat::Png => Some(OutputFormat::Png),
        ImageFormat::WebP => Some(OutputFormat::WebP),
        ImageFormat::Avif => Some(OutputFormat::Avif),
        ImageFormat::Gif => Some(OutputFormat::Gif),
        ImageFormat::Tiff => Some(OutputFormat::Tiff),
        _ => None,
    }
}

/// 8-bit RGB or RGBA, whichever keeps the alpha channel.
fn to_rgb_or_rgba(image: DynamicImage) -> DynamicImage {
    match image {
        DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_) => image,
        other if other.color().has_alpha() => DynamicImage::ImageRgba8(other.to_rgba8()),
        other => DynamicImage::ImageRgb8(other.to_rgb8()),
    }
}

/// More than 8 bits per channel.
fn is_deep(image: &DynamicImage) -> bool {
    let color = image.color();
    color.bytes_per_pixel() > color.channel_count()
}

/// 16-bit RGB or RGBA, whichever keeps the alpha channel.
fn to_rgb16_or_rgba16(image: DynamicImage) -> DynamicImage {
    if image.color().has_alpha() {
        DynamicImage::ImageRgba16(image.to_rgba16())
    } else {
        DynamicImage::ImageRgb16(image.to_rgb16())
    }
}

/// PNG takes grey and RGB at 8 or 16 bits as they are; float layouts go to 16 bits.
fn png_layout(image: DynamicImage) -> DynamicImage {
    match image.color() {
        ColorType::L8
        | ColorType::La8
        | ColorType::Rgb8
        | ColorType::Rgba8
        | ColorType::L16
        | ColorType::La16
        | ColorType::Rgb16
        | ColorType::Rgba16 => image,
        _ => to_rgb16_or_rgba16(image),
    }
}

/// TIFF has no grey+alpha layout; those widen to RGBA at the same depth.
fn tiff_layout(image: DynamicImage) -> DynamicImage {
    match image.color() {
        ColorType::L8
        | ColorType::Rgb8
        | ColorType::Rgba8
        | ColorType::L16
        | ColorType::Rgb16
        | ColorType::Rgba16 => image,
        ColorType::La8 => DynamicImage::ImageRgba8(image.to_rgba8()),
        _ => to_rgb16_or_rgba16(image),
    }
}

fn png_compression(level: u8) -> CompressionType {
    match level {
        0..=3 => CompressionType::Fast,
        4..=6 => CompressionType::Default,
        _ => CompressionType::Best,
    }
}

/// Lossless palette, bit depth and color type reduction.
fn reduce_palette(png: &[u8], level: u8) -> Result<Vec<u8>, EngineError> {
    let mut options = oxipng::Options::from_preset(level.min(6));
    options.palette_reduction = true;
    options.bit_depth_reduction = true;
    options.color_type_reduction = true;
    options.strip = oxipng::StripChunks::Safe;

    oxipng::optimize_from_memory(png, &options)
        .map_err(|e| EngineError::Encode(format!("png palette reduction failed: {}", e)))
}

impl ImageEngine for RasterEngine {
    type Image = DynamicImage;

    fn decode(&self, source: &[u8]) -> Result<Decoded<DynamicImage>, EngineError> {
        if source.is_empty() {
            return Err(EngineError::Decode("source is empty".to_string()));
        }

        let reader = Self::reader(source)?;
        let Some(input) = reader.format() else {
            return Err(EngineError::Decode("unrecognised image format".to_string()));
        };

        let (width, height) = reader.into_dimensions().map_err(decode_error)?;
        let pixels = width as u64 * height as u64;
        if pixels > self.max_input_pixels {
            return Err(EngineError::LimitExceeded(format!(
                "source {}x{} exceeds {} pixels",
                width, height, self.max_input_pixels
            )));
        }

        let mut reader = Self::reader(source)?;
        reader.no_limits();
        let image = reader.decode().map_err(decode_error)?;

        tracing::debug!(format = ?input, width, height, "Decoded source image");
        Ok(Decoded {
            image,
            format: encodable(input),
        })
    }

    fn trim(&self, image: DynamicImage, threshold: u32) -> Result<DynamicImage, EngineError> {
        let rgba = image.to_rgba8();
        let reference = *rgba.get_pixel(0, 0);
        let differs = |p: &Rgba<u8>| {
            p.0.iter()
                .zip(reference.0.iter())
                .any(|(a, b)| a.abs_diff(*b) as u32 > threshold)
        };

        let mut bounds: Option<(u32, u32, u32, u32)> = None;
        for (x, y, pixel) in rgba.enumerate_pixels() {
            if differs(pixel) {
                bounds = Some(match bounds {
                    None => (x, y, x, y),
                    Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
                });
            }
        }

        // nothing differs: a single-colour image is left alone
        let Some((x0, y0, x1, y1)) = bounds else {
            return Ok(image);
        };
        Ok(image.crop_imm(x0, y0, x1 - x0 + 1, y1 - y0 + 1))
    }

    fn resize(&self, image: DynamicImage, spec: &ResizeSpec) -> Result<DynamicImage, EngineError> {
        let src = (image.width(), image.height());
        let plan = layout(src, spec.width, spec.height, spec.fit);
        let (width, height) = plan.output();
        self.check_output(width, height)?;

        match plan {
            ResizeLayout::Exact { width, height } => {
                Ok(image.resize_exact(width, height, FilterType::Lanczos3))
            }
            ResizeLayout::Crop { scaled, width, height } => {
                self.check_output(scaled.0, scaled.1)?;
                let resized = image.resize_exact(scaled.0, scaled.1, FilterType::Lanczos3);
                let (x, y) = match spec.position {
                    Position::Center => ((scaled.0 - width) / 2, (scaled.1 - height) / 2),
                    position => crop_origin(&resized.to_rgba8(), width, height, position),
                };
                Ok(resized.crop_imm(x, y, width, height))
            }
            ResizeLayout::Pad { scaled, width, height } => {
                let resized = image.resize_exact(scaled.0, scaled.1, FilterType::Lanczos3);
                let x = ((width - scaled.0) / 2) as i64;
                let y = ((height - scaled.1) / 2) as i64;
                if is_deep(&resized) {
                    let mut canvas = ImageBuffer::from_pixel(width, height, PAD_BACKGROUND_16);
                    imageops::overlay(&mut canvas, &resized.to_rgba16(), x, y);
                    Ok(DynamicImage::ImageRgba16(canvas))
                } else {
                    let mut canvas = RgbaImage::from_pixel(width, height, PAD_BACKGROUND);
                    imageops::overlay(&mut canvas, &resized.to_rgba8(), x, y);
                    Ok(DynamicImage::ImageRgba8(canvas))
                }
            }
        }
    }

    fn encode(
        &self,
        image: DynamicImage,
        input_format: Option<OutputFormat>,
        options: &EncodeOptions,
    ) -> Result<TransformResult, EngineError> {
        let format = options.format.or(input_format).unwrap_or(OutputFormat::Jpeg);
        let mut data = Vec::new();

        let image = match format {
            OutputFormat::Jpeg => {
                let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
                let encoder = JpegEncoder::new_with_quality(&mut data, options.quality);
                rgb.write_with_encoder(encoder).map_err(encode_error(format))?;
                rgb
            }
            OutputFormat::Png => {
                let image = png_layout(image);
                let level = options.compression_level.unwrap_or(DEFAULT_PNG_COMPRESSION);
                let encoder = PngEncoder::new_with_quality(
                    &mut data,
                    png_compression(level),
                    PngFilter::Adaptive,
                );
                image.write_with_encoder(encoder).map_err(encode_error(format))?;
                if options.palette == Some(true) {
                    data = reduce_palette(&data, level)?;
                }
                image
            }
            OutputFormat::WebP => {
                let image = to_rgb_or_rgba(image);
                let encoder = WebPEncoder::new_lossless(&mut data);
                image.write_with_encoder(encoder).map_err(encode_error(format))?;
                image
            }
            OutputFormat::Avif => {
                let image = to_rgb_or_rgba(image);
                let speed = options.speed.unwrap_or(DEFAULT_AVIF_SPEED);
                let quality = if options.lossless { 100 } else { options.quality };
                let encoder = AvifEncoder::new_with_speed_quality(&mut data, speed, quality);
                image.write_with_encoder(encoder).map_err(encode_error(format))?;
                image
            }
            OutputFormat::Gif => {
                let image = DynamicImage::ImageRgba8(image.to_rgba8());
                image
                    .write_to(&mut Cursor::new(&mut data), ImageFormat::Gif)
                    .map_err(encode_error(format))?;
                image
            }
            OutputFormat::Tiff => {
                let image = tiff_layout(image);
                image
                    .write_to(&mut Cursor::new(&mut data), ImageFormat::Tiff)
                    .map_err(encode_error(format))?;
                image
            }
        };

        Ok(TransformResult {
            data,
            format: Some(format.name().to_string()),
            width: image.width(),
            height: image.height(),
            channels: image.color().channel_count(),
        })
    }
}
