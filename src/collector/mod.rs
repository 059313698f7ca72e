//! Host event intake for the scroll odometer.
//!
//! This module provides the event and sample types and a JSON-lines stream
//! that feeds host events into the service.

pub mod stream;
pub mod types;

// Re-export commonly used types
pub use stream::{EventSource, EventStream, StreamError};
pub use types::{DisplayMetrics, DistanceSample, EventKind, HostEvent, TEST_APP, UNKNOWN_APP};
