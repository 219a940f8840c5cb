//! Display canvas sizing.

/// Default longest side of the interactive preview canvas.
pub const DEFAULT_MAX_DIMENSION: u32 = 512;

/// Scale `width x height` down to fit within `max_dimension` on both sides.
///
/// Images that already fit are never upscaled. Each side is rounded and kept
/// at least one pixel.
pub fn fit_canvas(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (width.max(1), height.max(1));
    }
    let max = f64::from(max_dimension.max(1));
    let scale = (max / f64::from(width)).min(max / f64::from(height)).min(1.0);
    let fit = |side: u32| ((f64::from(side) * scale).round() as u32).max(1);
    (fit(width), fit(height))
}

/// Factor that maps preview canvas pixels back to original pixels.
pub fn canvas_to_original_scale(original_width: u32, canvas_width: u32) -> f64 {
    if canvas_width == 0 {
        return 1.0;
    }
    f64::from(original_width) / f64::from(canvas_width)
}
