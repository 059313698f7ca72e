//! Delta extraction: host events to physical distance samples.
//!
//! The extractor remembers the last scroll offset seen for each window and
//! turns the difference into meters. When offsets do not move, it falls back
//! to platform delta hints and then to list-index movement.
//!
//! Offset memory is dropped whenever the window context changes: a missing
//! sample is better than a phantom jump between unrelated views.

use crate::clock::SharedClock;
use crate::collector::types::{DistanceSample, EventKind, HostEvent};
use crate::core::conversion::{
    clamp_distance, delta_to_meters, row_height_px, PixelDelta, DEFAULT_MAX_SAMPLE_METERS,
    DEFAULT_ROW_HEIGHT_DP,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Tunable constants for extraction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Height of one list row in density-independent pixels
    pub row_height_dp: f64,
    /// Largest distance a single event may contribute, in meters
    pub max_sample_meters: f64,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            row_height_dp: DEFAULT_ROW_HEIGHT_DP,
            max_sample_meters: DEFAULT_MAX_SAMPLE_METERS,
        }
    }
}

/// Last-seen scroll position of a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowOffset {
    pub x: i32,
    pub y: i32,
}

/// Touch interaction state. Tags samples; never gates them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TouchState {
    pub is_touch_interaction: bool,
    pub last_touch_time_ms: i64,
}

/// Which rule produced the pixel delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaSource {
    Offsets,
    Hints,
    ListIndices,
}

/// Result of feeding one event to the extractor.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    /// A positive distance was measured.
    Sample {
        sample: DistanceSample,
        source: DeltaSource,
    },
    /// The scroll report was invalid (negative window id or offsets).
    Rejected,
    /// A valid scroll event that moved nothing measurable.
    NoMovement,
    /// A non-scroll event that only updated internal state.
    StateChanged,
}

impl Extraction {
    pub fn into_sample(self) -> Option<DistanceSample> {
        match self {
            Extraction::Sample { sample, .. } => Some(sample),
            _ => None,
        }
    }
}

/// Converts host events into distance samples.
pub struct DeltaExtractor {
    config: ExtractorConfig,
    clock: SharedClock,
    offsets: HashMap<i32, WindowOffset>,
    touch: TouchState,
}

impl DeltaExtractor {
    pub fn new(config: ExtractorConfig, clock: SharedClock) -> Self {
        Self {
            config,
            clock,
            offsets: HashMap::new(),
            touch: TouchState::default(),
        }
    }

    /// Process an event and return the sample it produced, if any.
    pub fn extract(&mut self, event: &HostEvent) -> Option<DistanceSample> {
        self.process(event).into_sample()
    }

    /// Process an event, reporting what happened.
    pub fn process(&mut self, event: &HostEvent) -> Extraction {
        match event.kind {
            EventKind::Scroll => self.handle_scroll(event),
            EventKind::WindowChange => {
                self.offsets.clear();
                tracing::debug!("Window state changed, cleared offsets");
                Extraction::StateChanged
            }
            EventKind::TouchStart => {
                self.touch.is_touch_interaction = true;
                self.touch.last_touch_time_ms = self.clock.now_millis();
                Extraction::StateChanged
            }
            EventKind::TouchEnd => {
                self.touch.is_touch_interaction = false;
                Extraction::StateChanged
            }
            EventKind::Click => {
                tracing::debug!("View interaction in {}", event.app_or_unknown());
                Extraction::StateChanged
            }
        }
    }

    fn handle_scroll(&mut self, event: &HostEvent) -> Extraction {
        let app_id = event.app_or_unknown();

        if event.window_id < 0 || (event.scroll_x < 0 && event.scroll_y < 0) {
            tracing::debug!(
                "Ignoring invalid scroll from {app_id}: x={}, y={}, window={}",
                event.scroll_x,
                event.scroll_y,
                event.window_id
            );
            return Extraction::Rejected;
        }

        let current = WindowOffset {
            x: event.scroll_x,
            y: event.scroll_y,
        };

        let mut delta = match self.offsets.get(&event.window_id) {
            Some(prev) => PixelDelta::new(
                (current.x as i64 - prev.x as i64).abs(),
                (current.y as i64 - prev.y as i64).abs(),
            ),
            None => PixelDelta::default(),
        };
        let mut source = DeltaSource::Offsets;

        self.remember(event.window_id, current);

        if delta.is_zero() {
            let hint_x = event.scroll_delta_x.map_or(0, |d| (d as i64).abs());
            let hint_y = event.scroll_delta_y.map_or(0, |d| (d as i64).abs());
            if hint_x > 0 || hint_y > 0 {
                delta = PixelDelta::new(hint_x, hint_y);
                source = DeltaSource::Hints;
            }
        }

        if delta.is_zero() {
            if let (Some(from), Some(to)) = (event.from_index, event.to_index) {
                if from >= 0 && to >= 0 && from != to {
                    let steps = (to as i64 - from as i64).abs();
                    let row_px =
                        row_height_px(self.config.row_height_dp, event.display.density_scale);
                    delta = PixelDelta::new(0, steps.saturating_mul(row_px));
                    source = DeltaSource::ListIndices;
                }
            }
        }

        let meters = delta_to_meters(delta, &event.display);
        let distance = clamp_distance(meters, self.config.max_sample_meters);

        if distance > 0.0 {
            let sample = DistanceSample::new(
                distance,
                self.clock.now_millis(),
                app_id,
                self.touch.is_touch_interaction,
            );
            tracing::debug!("Measured {distance}m from {app_id} via {source:?}");
            Extraction::Sample { sample, source }
        } else {
            Extraction::NoMovement
        }
    }

    /// Store the window's offset, dropping all offsets if memory is exhausted.
    fn remember(&mut self, window_id: i32, offset: WindowOffset) {
        if !self.offsets.contains_key(&window_id) {
            if let Err(e) = self.offsets.try_reserve(1) {
                tracing::error!("Out of memory tracking window offsets ({e}), clearing");
                self.offsets.clear();
            }
        }
        self.offsets.insert(window_id, offset);
    }

    /// Forget all window offsets and touch state.
    pub fn reset(&mut self) {
        self.offsets.clear();
        self.touch = TouchState::default();
    }

    /// Forget window offsets only.
    pub fn clear_offsets(&mut self) {
        self.offsets.clear();
    }

    pub fn offset(&self, window_id: i32) -> Option<WindowOffset> {
        self.offsets.get(&window_id).copied()
    }

    pub fn tracked_windows(&self) -> usize {
        self.offsets.len()
    }

    pub fn touch_state(&self) -> TouchState {
        self.touch
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::collector::types::DisplayMetrics;
    use crate::core::conversion::METERS_PER_INCH;
    use std::sync::Arc;

    fn extractor() -> DeltaExtractor {
        let clock = Arc::new(FixedClock::at_day("2025-1-1".parse().unwrap()));
        DeltaExtractor::new(ExtractorConfig::default(), clock)
    }

    /// 254 dpi makes 1 px = 0.0001 m.
    fn display() -> DisplayMetrics {
        DisplayMetrics::uniform(254.0, 1.0)
    }

    fn scroll(window: i32, x: i32, y: i32) -> HostEvent {
        HostEvent::scroll(window, x, y, display()).with_app("com.example.feed")
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_first_observation_is_baseline() {
        let mut ex = extractor();
        assert_eq!(ex.process(&scroll(1, 0, 500)), Extraction::NoMovement);
        assert_eq!(ex.offset(1), Some(WindowOffset { x: 0, y: 500 }));
    }

    #[test]
    fn test_delta_is_absolute_difference() {
        let mut ex = extractor();
        ex.extract(&scroll(1, 0, 500));

        let sample = ex.extract(&scroll(1, 0, 754)).unwrap();
        assert!(approx(sample.distance_m, 0.0254));
        assert_eq!(sample.app_id, "com.example.feed");

        // Scrolling back counts the same distance.
        let sample = ex.extract(&scroll(1, 0, 500)).unwrap();
        assert!(approx(sample.distance_m, 0.0254));
        assert_eq!(ex.offset(1), Some(WindowOffset { x: 0, y: 500 }));
    }

    #[test]
    fn test_windows_are_tracked_independently() {
        let mut ex = extractor();
        ex.extract(&scroll(1, 0, 100));
        ex.extract(&scroll(2, 0, 9000));

        let sample = ex.extract(&scroll(1, 0, 354)).unwrap();
        assert!(approx(sample.distance_m, 0.0254));
        assert_eq!(ex.tracked_windows(), 2);
    }

    #[test]
    fn test_window_change_resets_baseline() {
        let mut ex = extractor();
        ex.extract(&scroll(1, 0, 100));
        assert_eq!(
            ex.process(&HostEvent::window_change()),
            Extraction::StateChanged
        );
        assert_eq!(ex.tracked_windows(), 0);

        // A huge jump right after the context switch is only a new baseline.
        assert_eq!(ex.process(&scroll(1, 0, 40_000)), Extraction::NoMovement);
    }

    #[test]
    fn test_rejects_invalid_reports_without_touching_memory() {
        let mut ex = extractor();
        ex.extract(&scroll(1, 0, 100));

        assert_eq!(ex.process(&scroll(-1, 0, 300)), Extraction::Rejected);
        assert_eq!(ex.process(&scroll(1, -1, -1)), Extraction::Rejected);
        assert_eq!(ex.offset(1), Some(WindowOffset { x: 0, y: 100 }));
        assert_eq!(ex.offset(-1), None);

        // A single negative axis is still a valid report.
        assert!(ex.extract(&scroll(1, -1, 200)).is_some());
    }

    #[test]
    fn test_hint_fallback_when_offsets_do_not_move() {
        let mut ex = extractor();
        ex.extract(&scroll(3, 0, 0));

        let event = scroll(3, 0, 0).with_deltas(0, -254);
        match ex.process(&event) {
            Extraction::Sample { sample, source } => {
                assert_eq!(source, DeltaSource::Hints);
                assert!(approx(sample.distance_m, 0.0254));
            }
            other => panic!("expected sample, got {other:?}"),
        }
    }

    #[test]
    fn test_hints_apply_to_first_observation() {
        let mut ex = extractor();
        let sample = ex.extract(&scroll(3, 0, 0).with_deltas(254, 0)).unwrap();
        assert!(approx(sample.distance_m, 0.0254));
        assert_eq!(ex.offset(3), Some(WindowOffset { x: 0, y: 0 }));
    }

    #[test]
    fn test_offsets_win_over_hints() {
        let mut ex = extractor();
        ex.extract(&scroll(3, 0, 0));
        let event = scroll(3, 0, 254).with_deltas(0, 2540);
        match ex.process(&event) {
            Extraction::Sample { sample, source } => {
                assert_eq!(source, DeltaSource::Offsets);
                assert!(approx(sample.distance_m, 0.0254));
            }
            other => panic!("expected sample, got {other:?}"),
        }
    }

    #[test]
    fn test_index_fallback_uses_row_height() {
        let mut ex = extractor();
        let display = DisplayMetrics::uniform(254.0, 2.54);
        let event = HostEvent::scroll(4, 0, 0, display)
            .with_deltas(0, 0)
            .with_indices(10, 13);

        match ex.process(&event) {
            Extraction::Sample { sample, source } => {
                assert_eq!(source, DeltaSource::ListIndices);
                // 3 rows * 254 px at 254 dpi = 3 inches.
                assert!(approx(sample.distance_m, 3.0 * METERS_PER_INCH));
            }
            other => panic!("expected sample, got {other:?}"),
        }
        assert_eq!(ex.offset(4), Some(WindowOffset { x: 0, y: 0 }));
    }

    #[test]
    fn test_index_fallback_needs_valid_distinct_indices() {
        let mut ex = extractor();
        for (from, to) in [(5, 5), (-1, 3), (3, -1)] {
            let event = scroll(5, 0, 0).with_indices(from, to);
            assert_eq!(ex.process(&event), Extraction::NoMovement, "{from}->{to}");
        }
    }

    #[test]
    fn test_spike_is_clamped() {
        let mut ex = extractor();
        ex.extract(&scroll(1, 0, 0));
        let sample = ex.extract(&scroll(1, 0, 100_000)).unwrap();
        assert_eq!(sample.distance_m, 5.0);
    }

    #[test]
    fn test_unknown_dpi_produces_nothing() {
        let mut ex = extractor();
        let event = HostEvent::scroll(1, 0, 0, DisplayMetrics::default());
        ex.extract(&event);
        let event = HostEvent::scroll(1, 0, 500, DisplayMetrics::default());
        assert_eq!(ex.process(&event), Extraction::NoMovement);
        // The offset still moved.
        assert_eq!(ex.offset(1), Some(WindowOffset { x: 0, y: 500 }));
    }

    #[test]
    fn test_touch_state_tags_samples() {
        let mut ex = extractor();
        ex.extract(&scroll(1, 0, 0));

        ex.process(&HostEvent::touch_start());
        let state = ex.touch_state();
        assert!(state.is_touch_interaction);
        assert!(state.last_touch_time_ms > 0);

        let sample = ex.extract(&scroll(1, 0, 10)).unwrap();
        assert!(sample.is_touch);

        ex.process(&HostEvent::touch_end());
        let sample = ex.extract(&scroll(1, 0, 20)).unwrap();
        assert!(!sample.is_touch);
    }

    #[test]
    fn test_clicks_change_nothing() {
        let mut ex = extractor();
        ex.extract(&scroll(1, 0, 10));
        assert_eq!(
            ex.process(&HostEvent::click("com.example.feed")),
            Extraction::StateChanged
        );
        assert_eq!(ex.offset(1), Some(WindowOffset { x: 0, y: 10 }));
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut ex = extractor();
        ex.extract(&scroll(1, 0, 10));
        ex.process(&HostEvent::touch_start());

        ex.reset();
        assert_eq!(ex.tracked_windows(), 0);
        assert_eq!(ex.touch_state(), TouchState::default());
    }

    #[test]
    fn test_missing_app_is_unknown() {
        let mut ex = extractor();
        ex.extract(&HostEvent::scroll(1, 0, 0, display()));
        let sample = ex
            .extract(&HostEvent::scroll(1, 0, 100, display()))
            .unwrap();
        assert_eq!(sample.app_id, "unknown");
    }
}
