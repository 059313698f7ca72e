//! Scroll Odometer - turns scroll activity into physical distance.
//!
//! Host scroll events are converted into meters of content scrolled past,
//! using the display's physical DPI, and folded into a durable ledger of
//! daily, lifetime and per-app totals with calendar-day rollover.
//!
//! # Guarantees
//!
//! - **Persist first**: a sample reaches a sink only after the ledger stored it
//! - **No phantom jumps**: window changes drop offset memory instead of guessing
//! - **Exactly once**: each accepted sample is counted once; replays count again
//! - **Transparency**: every event, sample and failure is counted and auditable
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Scroll Odometer                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │ EventStream │──▶│  Extractor  │──▶│   Ledger    │       │
//! │  │ (JSON lines)│   │ (px → m)    │   │ (fold/roll) │       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! │         │                                    │              │
//! │         ▼                                    ▼              │
//! │  ┌─────────────┐                     ┌─────────────┐       │
//! │  │Transparency │                     │    Sink     │       │
//! │  │    Log      │                     │ (forward)   │       │
//! │  └─────────────┘                     └─────────────┘       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use scroll_odometer::{collector, config::Config, core, service, transparency};
//! use std::sync::Arc;
//!
//! let config = Config::load().unwrap_or_default();
//! let clock = config.clock();
//! let ledger = Arc::new(config.open_ledger(clock.clone()).expect("ledger"));
//! let extractor = core::DeltaExtractor::new(config.extraction, clock);
//! let mut service =
//!     service::ScrollService::new(extractor, ledger, transparency::create_shared_log());
//!
//! let event = collector::HostEvent::scroll(1, 0, 480, collector::DisplayMetrics::uniform(420.0, 2.625));
//! service.handle_event(&event);
//! ```

pub mod clock;
pub mod collector;
pub mod config;
pub mod core;
pub mod error;
pub mod ledger;
pub mod service;
pub mod sink;
pub mod transparency;

#[cfg(feature = "gateway")]
pub mod gateway;

#[cfg(feature = "server")]
pub mod server;

// Re-export key types at crate root for convenience
pub use clock::{Clock, FixedClock, SharedClock, SystemClock};
pub use collector::{DisplayMetrics, DistanceSample, EventKind, EventStream, HostEvent};
pub use config::Config;
pub use core::{DeltaExtractor, ExtractorConfig};
pub use error::{ConfigError, LedgerError};
pub use ledger::{DayKey, FileStore, KeyValueStore, Ledger, MemoryStore};
pub use service::{EventOutcome, ScrollService};
pub use sink::{ChannelSink, SampleSink, SinkError};
pub use transparency::{SharedTransparencyLog, TransparencyLog, TransparencyStats};

// Gateway re-exports (when enabled)
#[cfg(feature = "gateway")]
pub use gateway::{BlockingGatewayClient, GatewayClient, GatewayConfig, GatewayError, GatewaySink};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
