//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

/// Fit an image under a maximum width, preserving aspect ratio.
///
/// Images already within the ceiling keep their exact dimensions; wider
/// images are scaled down so the width equals `max_width`. Never upscales.
///
/// # Arguments
/// * `original` - Source dimensions (width, height)
/// * `max_width` - Resize ceiling for this class of asset
///
/// # Returns
/// * `(width, height)` - Output dimensions
pub fn fit_to_width(original: (u32, u32), max_width: u32) -> (u32, u32) {
    let (orig_w, orig_h) = original;
    if orig_w <= max_width {
        return original;
    }

    let ratio = max_width as f64 / orig_w as f64;
    let height = (orig_h as f64 * ratio).round() as u32;
    (max_width, height.max(1))
}
