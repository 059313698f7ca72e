//! Core functionality for the scroll odometer.
//!
//! This module contains:
//! - Pixel to physical distance conversion
//! - The stateful scroll-delta extractor

pub mod conversion;
pub mod extractor;

// Re-export commonly used types
pub use conversion::{clamp_distance, delta_to_meters, pixels_to_meters, PixelDelta};
pub use extractor::{
    DeltaExtractor, DeltaSource, Extraction, ExtractorConfig, TouchState, WindowOffset,
};
