//! The scroll service: one host event at a time, persist first, then forward.
//!
//! ```text
//!  host event ──▶ DeltaExtractor ──▶ Ledger::fold ──▶ SampleSink (best effort)
//!                     │                   │
//!                     ▼                   ▼
//!              offset memory        durable store
//! ```
//!
//! Lifecycle hooks clear the extractor's window memory and touch state so a
//! reconnected service never computes a delta against a stale offset.

use crate::collector::types::{DistanceSample, EventKind, HostEvent, TEST_APP};
use crate::core::extractor::{DeltaExtractor, Extraction};
use crate::error::LedgerError;
use crate::ledger::{FoldSummary, Ledger};
use crate::sink::{SampleSink, SinkError};
use crate::transparency::SharedTransparencyLog;
use std::sync::Arc;

/// Distance carried by a manually injected test sample.
pub const TEST_SAMPLE_METERS: f64 = 0.1;

/// What happened to one host event.
#[derive(Debug)]
pub enum EventOutcome {
    /// A sample was folded into the ledger.
    Recorded {
        sample: DistanceSample,
        summary: FoldSummary,
        /// Forwarding result; `None` when no healthy sink was attached
        forwarded: Option<Result<(), SinkError>>,
    },
    /// A sample was produced but the durable write failed.
    PersistFailed {
        sample: DistanceSample,
        error: LedgerError,
    },
    /// The event produced no sample.
    NoSample,
}

impl EventOutcome {
    pub fn sample(&self) -> Option<&DistanceSample> {
        match self {
            EventOutcome::Recorded { sample, .. } | EventOutcome::PersistFailed { sample, .. } => {
                Some(sample)
            }
            EventOutcome::NoSample => None,
        }
    }
}

/// Owns the per-process state for turning host events into ledger entries.
pub struct ScrollService {
    extractor: DeltaExtractor,
    ledger: Arc<Ledger>,
    sink: Option<Box<dyn SampleSink>>,
    log: SharedTransparencyLog,
}

impl ScrollService {
    pub fn new(extractor: DeltaExtractor, ledger: Arc<Ledger>, log: SharedTransparencyLog) -> Self {
        Self {
            extractor,
            ledger,
            sink: None,
            log,
        }
    }

    /// Attach or replace the forwarding sink.
    pub fn attach_sink(&mut self, sink: Box<dyn SampleSink>) {
        tracing::debug!("Sink {} attached", sink.name());
        self.sink = Some(sink);
    }

    /// Detach the forwarding sink; samples are then only persisted.
    pub fn detach_sink(&mut self) -> Option<Box<dyn SampleSink>> {
        self.sink.take()
    }

    pub fn has_sink(&self) -> bool {
        self.sink.is_some()
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    pub fn extractor(&self) -> &DeltaExtractor {
        &self.extractor
    }

    pub fn transparency(&self) -> &SharedTransparencyLog {
        &self.log
    }

    /// The host (re)connected the service.
    pub fn on_connected(&mut self) {
        self.extractor.reset();
        tracing::info!("Scroll service connected");
    }

    /// The host unbound the service.
    pub fn on_unbind(&mut self) {
        self.extractor.reset();
        tracing::info!("Scroll service unbound");
    }

    /// The service is being torn down; the sink is released as well.
    pub fn on_destroy(&mut self) {
        self.extractor.reset();
        self.sink = None;
        tracing::info!("Scroll service destroyed");
    }

    /// Process one host event to completion.
    pub fn handle_event(&mut self, event: &HostEvent) -> EventOutcome {
        self.log.record_event();
        if event.kind == EventKind::Scroll {
            self.log.record_scroll_event();
        }

        match self.extractor.process(event) {
            Extraction::Sample { sample, .. } => self.record(sample),
            Extraction::Rejected => {
                self.log.record_rejected();
                EventOutcome::NoSample
            }
            Extraction::NoMovement | Extraction::StateChanged => EventOutcome::NoSample,
        }
    }

    /// Send a small tagged sample through the normal path, to check the
    /// ledger and sink are wired up.
    pub fn inject_test_sample(&mut self, timestamp_ms: i64) -> EventOutcome {
        let sample = DistanceSample::new(TEST_SAMPLE_METERS, timestamp_ms, TEST_APP, false);
        self.record(sample)
    }

    /// Persist the sample, then offer it to the sink.
    fn record(&mut self, sample: DistanceSample) -> EventOutcome {
        let summary = match self.ledger.fold(&sample) {
            Ok(summary) => summary,
            Err(error) => {
                self.log.record_persist_failure();
                return EventOutcome::PersistFailed { sample, error };
            }
        };
        self.log.record_sample();

        let forwarded = self.forward(&sample);
        EventOutcome::Recorded {
            sample,
            summary,
            forwarded,
        }
    }

    fn forward(&mut self, sample: &DistanceSample) -> Option<Result<(), SinkError>> {
        let sink = self.sink.as_mut()?;
        if !sink.is_healthy() {
            tracing::debug!("Sink {} unhealthy, sample persisted locally only", sink.name());
            return None;
        }

        let result = sink.deliver(sample);
        if let Err(ref e) = result {
            tracing::warn!("Failed to forward sample to {}: {e}", sink.name());
            self.log.record_sink_failure();
        }
        Some(result)
    }
}
