//! Transparency module for the scroll odometer.
//!
//! Tracks how many events were seen, how many became samples, and how many
//! writes or forwards failed, so users can audit what was measured.

pub mod log;

// Re-export commonly used types
pub use log::{
    create_shared_log, create_shared_log_with_persistence, SharedTransparencyLog, TransparencyLog,
    TransparencyStats,
};
