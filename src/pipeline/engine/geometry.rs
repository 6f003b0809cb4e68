//! Resize geometry for the fit modes.
//!
//! All functions are pure and work on dimensions only, so the contracts of
//! each fit mode can be checked without touching pixels.

use crate::pipeline::params::Fit;

/// What the resize stage has to do, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeLayout {
    /// Resample straight to `width`×`height`.
    Exact { width: u32, height: u32 },
    /// Resample to `scaled`, then cut a `width`×`height` window out of it.
    Crop { scaled: (u32, u32), width: u32, height: u32 },
    /// Resample to `scaled`, then center it on a `width`×`height` canvas.
    Pad { scaled: (u32, u32), width: u32, height: u32 },
}

impl ResizeLayout {
    /// Final output dimensions.
    pub fn output(&self) -> (u32, u32) {
        match *self {
            ResizeLayout::Exact { width, height }
            | ResizeLayout::Crop { width, height, .. }
            | ResizeLayout::Pad { width, height, .. } => (width, height),
        }
    }
}

fn scale_dim(dim: u32, scale: f64) -> u32 {
    ((dim as f64 * scale).round() as u32).max(1)
}

/// The requested box, with a missing side derived from the source aspect ratio.
pub fn target_box(src: (u32, u32), width: Option<u32>, height: Option<u32>) -> (u32, u32) {
    let (src_w, src_h) = src;
    match (width, height) {
        (Some(w), Some(h)) => (w, h),
        (Some(w), None) => (w, scale_dim(src_h, w as f64 / src_w as f64)),
        (None, Some(h)) => (scale_dim(src_w, h as f64 / src_h as f64), h),
        (None, None) => src,
    }
}

/// Aspect-preserving dimensions where the side with the chosen scale matches
/// the box exactly. `grow` picks the larger of the two scales.
fn fit_to_box(src: (u32, u32), target: (u32, u32), grow: bool) -> (u32, u32) {
    let (src_w, src_h) = src;
    let (box_w, box_h) = target;
    let scale_w = box_w as f64 / src_w as f64;
    let scale_h = box_h as f64 / src_h as f64;

    let width_drives = if grow { scale_w >= scale_h } else { scale_w <= scale_h };
    if width_drives {
        (box_w, scale_dim(src_h, scale_w))
    } else {
        (scale_dim(src_w, scale_h), box_h)
    }
}

/// Plan a resize of a `src` image for the given box and fit mode.
pub fn layout(src: (u32, u32), width: Option<u32>, height: Option<u32>, fit: Fit) -> ResizeLayout {
    let target = target_box(src, width, height);
    let (box_w, box_h) = target;

    match fit {
        Fit::Fill => ResizeLayout::Exact { width: box_w, height: box_h },
        Fit::Inside => {
            let (width, height) = fit_to_box(src, target, false);
            ResizeLayout::Exact { width, height }
        }
        Fit::Outside => {
            let (width, height) = fit_to_box(src, target, true);
            ResizeLayout::Exact { width, height }
        }
        Fit::Cover => {
            let (w, h) = fit_to_box(src, target, true);
            let scaled = (w.max(box_w), h.max(box_h));
            if scaled == target {
                ResizeLayout::Exact { width: box_w, height: box_h }
            } else {
                ResizeLayout::Crop { scaled, width: box_w, height: box_h }
            }
        }
        Fit::Contain => {
            let (w, h) = fit_to_box(src, target, false);
            let scaled = (w.min(box_w), h.min(box_h));
            if scaled == target {
                ResizeLayout::Exact { width: box_w, height: box_h }
            } else {
                ResizeLayout::Pad { scaled, width: box_w, height: box_h }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_box_derives_missing_side() {
        assert_eq!(target_box((1920, 1080), Some(800), None), (800, 450));
        assert_eq!(target_box((1920, 1080), None, Some(600)), (1067, 600));
        assert_eq!(target_box((1000, 10), Some(10), None), (10, 1));
        assert_eq!(target_box((100, 50), Some(300), Some(20)), (300, 20));
    }

    #[test]
    fn test_fill_ignores_aspect() {
        assert_eq!(
            layout((1000, 500), Some(300), Some(300), Fit::Fill),
            ResizeLayout::Exact { width: 300, height: 300 }
        );
    }

    #[test]
    fn test_inside_caps_one_side() {
        let out = layout((1000, 500), Some(300), Some(300), Fit::Inside).output();
        assert_eq!(out, (300, 150));

        let out = layout((500, 1000), Some(300), Some(300), Fit::Inside).output();
        assert_eq!(out, (150, 300));
    }

    #[test]
    fn test_outside_covers_box() {
        let out = layout((1000, 500), Some(300), Some(300), Fit::Outside).output();
        assert_eq!(out, (600, 300));

        let out = layout((100, 100), Some(300), Some(200), Fit::Outside).output();
        assert_eq!(out, (300, 300));
    }

    #[test]
    fn test_cover_crops_to_box() {
        assert_eq!(
            layout((1000, 500), Some(300), Some(300), Fit::Cover),
            ResizeLayout::Crop { scaled: (600, 300), width: 300, height: 300 }
        );
        // same aspect ratio needs no crop
        assert_eq!(
            layout((1000, 500), Some(200), Some(100), Fit::Cover),
            ResizeLayout::Exact { width: 200, height: 100 }
        );
    }

    #[test]
    fn test_contain_pads_to_box() {
        assert_eq!(
            layout((1000, 500), Some(300), Some(300), Fit::Contain),
            ResizeLayout::Pad { scaled: (300, 150), width: 300, height: 300 }
        );
    }

    #[test]
    fn test_single_dimension_keeps_aspect_for_every_fit() {
        for fit in [Fit::Contain, Fit::Cover, Fit::Fill, Fit::Inside, Fit::Outside] {
            assert_eq!(layout((1000, 500), Some(400), None, fit).output(), (400, 200), "{fit}");
        }
    }

    #[test]
    fn test_enlargement_is_allowed() {
        assert_eq!(layout((10, 10), Some(100), None, Fit::Inside).output(), (100, 100));
    }
}
