//! Host event records and the distance samples derived from them.
//!
//! Events arrive as one JSON object per call, in the shape the host
//! accessibility layer reports them. Only scroll events can produce samples.

use serde::{Deserialize, Serialize};

/// Kind of host event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A view scrolled
    Scroll,
    /// The foreground window changed
    WindowChange,
    /// A touch interaction began
    TouchStart,
    /// A touch interaction ended
    TouchEnd,
    /// A view was clicked or long-clicked
    Click,
}

/// Display characteristics reported alongside an event.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayMetrics {
    /// Physical horizontal dots per inch (0 when unknown)
    pub xdpi: f64,
    /// Physical vertical dots per inch (0 when unknown)
    pub ydpi: f64,
    /// Logical density bucket in dots per inch
    pub density_dpi: f64,
    /// Density scale factor (pixels per density-independent pixel)
    pub density_scale: f64,
}

impl DisplayMetrics {
    pub fn new(xdpi: f64, ydpi: f64, density_dpi: f64, density_scale: f64) -> Self {
        Self {
            xdpi,
            ydpi,
            density_dpi,
            density_scale,
        }
    }

    /// Same physical DPI on both axes, with a matching logical density.
    pub fn uniform(dpi: f64, density_scale: f64) -> Self {
        Self::new(dpi, dpi, dpi, density_scale)
    }
}

/// A raw event from the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    #[serde(default)]
    pub window_id: i32,
    /// Current horizontal scroll offset of the view, in pixels
    #[serde(default)]
    pub scroll_x: i32,
    /// Current vertical scroll offset of the view, in pixels
    #[serde(default)]
    pub scroll_y: i32,
    /// Platform-reported horizontal scroll delta, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scroll_delta_x: Option<i32>,
    /// Platform-reported vertical scroll delta, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scroll_delta_y: Option<i32>,
    /// First visible list item index, if the view is a list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_index: Option<i32>,
    /// Last visible list item index, if the view is a list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_index: Option<i32>,
    /// Originating application
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    #[serde(default)]
    pub display: DisplayMetrics,
}

impl HostEvent {
    fn bare(kind: EventKind) -> Self {
        Self {
            kind,
            window_id: 0,
            scroll_x: 0,
            scroll_y: 0,
            scroll_delta_x: None,
            scroll_delta_y: None,
            from_index: None,
            to_index: None,
            app_id: None,
            display: DisplayMetrics::default(),
        }
    }

    /// A scroll event reporting the view's current offsets.
    pub fn scroll(window_id: i32, scroll_x: i32, scroll_y: i32, display: DisplayMetrics) -> Self {
        Self {
            window_id,
            scroll_x,
            scroll_y,
            display,
            ..Self::bare(EventKind::Scroll)
        }
    }

    pub fn window_change() -> Self {
        Self::bare(EventKind::WindowChange)
    }

    pub fn touch_start() -> Self {
        Self::bare(EventKind::TouchStart)
    }

    pub fn touch_end() -> Self {
        Self::bare(EventKind::TouchEnd)
    }

    pub fn click(app_id: impl Into<String>) -> Self {
        Self {
            app_id: Some(app_id.into()),
            ..Self::bare(EventKind::Click)
        }
    }

    pub fn with_app(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = Some(app_id.into());
        self
    }

    pub fn with_deltas(mut self, delta_x: i32, delta_y: i32) -> Self {
        self.scroll_delta_x = Some(delta_x);
        self.scroll_delta_y = Some(delta_y);
        self
    }

    pub fn with_indices(mut self, from_index: i32, to_index: i32) -> Self {
        self.from_index = Some(from_index);
        self.to_index = Some(to_index);
        self
    }

    /// The originating app, or `"unknown"` when the host omitted it.
    pub fn app_or_unknown(&self) -> &str {
        self.app_id.as_deref().unwrap_or(UNKNOWN_APP)
    }
}

/// App id used when the host does not say where an event came from.
pub const UNKNOWN_APP: &str = "unknown";

/// App id carried by manually injected test samples.
pub const TEST_APP: &str = "test";

/// One physical scroll-distance measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistanceSample {
    /// Distance scrolled in meters (finite, non-negative, clamped)
    pub distance_m: f64,
    /// Wall-clock time the sample was produced, ms since the epoch
    pub timestamp_ms: i64,
    /// Originating application
    pub app_id: String,
    /// Whether a touch interaction was in progress
    pub is_touch: bool,
}

impl DistanceSample {
    pub fn new(distance_m: f64, timestamp_ms: i64, app_id: impl Into<String>, is_touch: bool) -> Self {
        Self {
            distance_m,
            timestamp_ms,
            app_id: app_id.into(),
            is_touch,
        }
    }

    /// Whether the distance can be folded into the ledger.
    pub fn is_valid(&self) -> bool {
        self.distance_m.is_finite() && self.distance_m >= 0.0
    }
}
