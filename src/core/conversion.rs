//! Pixel-to-meter conversion.
//!
//! Pixel deltas become physical distance through the display's DPI:
//! `meters = pixels / dpi * 0.0254`. Axes convert independently and combine
//! as a Euclidean norm, so a diagonal scroll counts once along its path.

use crate::collector::types::DisplayMetrics;

/// Meters per inch.
pub const METERS_PER_INCH: f64 = 0.0254;

/// Upper bound on a single sample, in meters.
pub const DEFAULT_MAX_SAMPLE_METERS: f64 = 5.0;

/// Approximate height of one list row, in density-independent pixels.
pub const DEFAULT_ROW_HEIGHT_DP: f64 = 100.0;

/// Per-axis pixel movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PixelDelta {
    pub x: i64,
    pub y: i64,
}

impl PixelDelta {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    pub fn is_zero(&self) -> bool {
        self.x == 0 && self.y == 0
    }
}

/// DPI for one axis: the physical value, or the logical density when the
/// physical value is missing.
pub fn effective_dpi(physical: f64, density_dpi: f64) -> f64 {
    if physical > 0.0 {
        physical
    } else {
        density_dpi
    }
}

/// Convert a pixel count along one axis to meters.
///
/// Zero pixels is zero meters even when the DPI is unknown.
pub fn pixels_to_meters(pixels: i64, dpi: f64) -> f64 {
    if pixels == 0 {
        return 0.0;
    }
    (pixels as f64 / dpi) * METERS_PER_INCH
}

/// Total distance of a pixel delta on the given display.
pub fn delta_to_meters(delta: PixelDelta, display: &DisplayMetrics) -> f64 {
    let x_dpi = effective_dpi(display.xdpi, display.density_dpi);
    let y_dpi = effective_dpi(display.ydpi, display.density_dpi);

    let meters_x = pixels_to_meters(delta.x, x_dpi);
    let meters_y = pixels_to_meters(delta.y, y_dpi);

    meters_x.hypot(meters_y)
}

/// Non-finite distances become zero; everything else is capped at `max_meters`.
pub fn clamp_distance(meters: f64, max_meters: f64) -> f64 {
    if meters.is_finite() {
        meters.min(max_meters)
    } else {
        0.0
    }
}

/// Row height in physical pixels for the given density scale.
///
/// Truncates to whole pixels.
pub fn row_height_px(row_height_dp: f64, density_scale: f64) -> i64 {
    let px = row_height_dp * density_scale;
    if px.is_finite() && px > 0.0 {
        px as i64
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn test_one_inch_is_0254_meters() {
        let display = DisplayMetrics::uniform(254.0, 1.0);
        let meters = delta_to_meters(PixelDelta::new(0, 254), &display);
        assert!(approx(meters, 0.0254));
    }

    #[test]
    fn test_axes_combine_as_hypotenuse() {
        // 3 and 4 inches on a 100 dpi screen: 5 inches of travel.
        let display = DisplayMetrics::uniform(100.0, 1.0);
        let meters = delta_to_meters(PixelDelta::new(300, 400), &display);
        assert!(approx(meters, 5.0 * METERS_PER_INCH));
    }

    #[test]
    fn test_axes_use_their_own_dpi() {
        let display = DisplayMetrics::new(100.0, 200.0, 160.0, 1.0);
        let x_only = delta_to_meters(PixelDelta::new(100, 0), &display);
        let y_only = delta_to_meters(PixelDelta::new(0, 100), &display);
        assert!(approx(x_only, METERS_PER_INCH));
        assert!(approx(y_only, METERS_PER_INCH / 2.0));
    }

    #[test]
    fn test_missing_physical_dpi_uses_density() {
        assert_eq!(effective_dpi(0.0, 160.0), 160.0);
        assert_eq!(effective_dpi(-1.0, 160.0), 160.0);
        assert_eq!(effective_dpi(401.0, 160.0), 401.0);

        let display = DisplayMetrics::new(0.0, 0.0, 160.0, 1.0);
        let meters = delta_to_meters(PixelDelta::new(0, 160), &display);
        assert!(approx(meters, METERS_PER_INCH));
    }

    #[test]
    fn test_unknown_dpi_is_not_finite() {
        let display = DisplayMetrics::default();
        let meters = delta_to_meters(PixelDelta::new(0, 10), &display);
        assert!(!meters.is_finite());
        assert_eq!(clamp_distance(meters, DEFAULT_MAX_SAMPLE_METERS), 0.0);
    }

    #[test]
    fn test_zero_axis_ignores_unknown_dpi() {
        let display = DisplayMetrics::new(0.0, 254.0, 0.0, 1.0);
        let meters = delta_to_meters(PixelDelta::new(0, 254), &display);
        assert!(approx(meters, 0.0254));
    }

    #[test]
    fn test_clamp() {
        assert_eq!(clamp_distance(100.0, 5.0), 5.0);
        assert_eq!(clamp_distance(5.0, 5.0), 5.0);
        assert_eq!(clamp_distance(0.3, 5.0), 0.3);
        assert_eq!(clamp_distance(f64::NAN, 5.0), 0.0);
        assert_eq!(clamp_distance(f64::INFINITY, 5.0), 0.0);
    }

    #[test]
    fn test_row_height() {
        assert_eq!(row_height_px(100.0, 2.75), 275);
        assert_eq!(row_height_px(100.0, 1.333), 133);
        assert_eq!(row_height_px(100.0, 0.0), 0);
        assert_eq!(row_height_px(100.0, f64::NAN), 0);
    }
}
