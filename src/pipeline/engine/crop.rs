//! Crop window selection for `cover` resizes.
//!
//! `entropy` and `attention` score a handful of candidate windows along the
//! overflowing axis on a sampled grid and keep the best one. Ties go to the
//! window closest to the center.

use image::RgbaImage;

use crate::pipeline::params::Position;

/// Candidate offsets tried per axis.
const CANDIDATES: u32 = 16;

/// Samples taken per window side when scoring.
const SAMPLES_PER_SIDE: u32 = 64;

/// Top-left corner of the `width`×`height` window to keep.
pub fn crop_origin(image: &RgbaImage, width: u32, height: u32, position: Position) -> (u32, u32) {
    let overflow_x = image.width().saturating_sub(width);
    let overflow_y = image.height().saturating_sub(height);
    let center = (overflow_x / 2, overflow_y / 2);

    let score: fn(&RgbaImage, u32, u32, u32, u32) -> f64 = match position {
        Position::Center => return center,
        Position::Entropy => entropy,
        Position::Attention => attention,
    };

    let mut best = center;
    let mut best_score = score(image, center.0, center.1, width, height);

    for x in offsets(overflow_x) {
        for y in offsets(overflow_y) {
            let s = score(image, x, y, width, height);
            let closer = distance((x, y), center) < distance(best, center);
            if s > best_score + f64::EPSILON || ((s - best_score).abs() <= f64::EPSILON && closer) {
                best = (x, y);
                best_score = s;
            }
        }
    }

    best
}

fn offsets(overflow: u32) -> Vec<u32> {
    if overflow == 0 {
        return vec![0];
    }
    let steps = CANDIDATES.min(overflow);
    (0..=steps).map(|i| (overflow as u64 * i as u64 / steps as u64) as u32).collect()
}

fn distance(a: (u32, u32), b: (u32, u32)) -> u64 {
    (a.0.abs_diff(b.0) as u64).pow(2) + (a.1.abs_diff(b.1) as u64).pow(2)
}

fn luma(p: &image::Rgba<u8>) -> f64 {
    0.299 * p[0] as f64 + 0.587 * p[1] as f64 + 0.114 * p[2] as f64
}

/// Sample coordinates inside a window, at most `SAMPLES_PER_SIDE` per axis.
fn sample_grid(x: u32, y: u32, width: u32, height: u32) -> impl Iterator<Item = (u32, u32)> {
    let step_x = (width / SAMPLES_PER_SIDE).max(1);
    let step_y = (height / SAMPLES_PER_SIDE).max(1);
    (0..height)
        .step_by(step_y as usize)
        .flat_map(move |dy| (0..width).step_by(step_x as usize).map(move |dx| (x + dx, y + dy)))
}

/// Shannon entropy of the luminance histogram, in bits.
fn entropy(image: &RgbaImage, x: u32, y: u32, width: u32, height: u32) -> f64 {
    let mut histogram = [0u32; 256];
    let mut total = 0u32;
    for (px, py) in sample_grid(x, y, width, height) {
        let l = luma(image.get_pixel(px, py)).round().clamp(0.0, 255.0) as usize;
        histogram[l] += 1;
        total += 1;
    }
    if total == 0 {
        return 0.0;
    }

    histogram
        .iter()
        .filter(|&&n| n > 0)
        .map(|&n| {
            let p = n as f64 / total as f64;
            -p * p.log2()
        })
        .sum()
}

/// Mean saturation plus local luminance contrast.
fn attention(image: &RgbaImage, x: u32, y: u32, width: u32, height: u32) -> f64 {
    let mut sum = 0.0;
    let mut count = 0u32;
    for (px, py) in sample_grid(x, y, width, height) {
        let p = image.get_pixel(px, py);
        let max = p[0].max(p[1]).max(p[2]) as f64;
        let min = p[0].min(p[1]).min(p[2]) as f64;
        let saturation = if max > 0.0 { (max - min) / max } else { 0.0 };

        let l = luma(p);
        let right = luma(image.get_pixel((px + 1).min(x + width - 1), py));
        let below = luma(image.get_pixel(px, (py + 1).min(y + height - 1)));
        let edge = ((l - right).abs() + (l - below).abs()) / 510.0;

        sum += saturation + edge;
        count += 1;
    }
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}
