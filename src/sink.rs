//! Best-effort forwarding of samples to a presentation layer.
//!
//! A sink sees a sample only after the ledger has durably stored it. Sinks may
//! be missing, slow, or refuse delivery; none of that reaches the ledger.

use crate::collector::types::DistanceSample;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use thiserror::Error;

/// Sink delivery failures.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Sink unavailable: {0}")]
    Unavailable(String),

    #[error("Sink rejected sample: {0}")]
    Rejected(String),

    #[error("Sink disconnected")]
    Disconnected,
}

/// Destination for computed samples.
pub trait SampleSink: Send {
    /// Deliver one sample. Never retried by the caller.
    fn deliver(&mut self, sample: &DistanceSample) -> Result<(), SinkError>;

    /// Whether delivery is worth attempting right now.
    fn is_healthy(&self) -> bool {
        true
    }

    /// Short name for logs.
    fn name(&self) -> &str;
}

/// In-process sink backed by a bounded crossbeam channel.
///
/// Delivery never blocks: a full queue is a rejected sample.
pub struct ChannelSink {
    sender: Sender<DistanceSample>,
}

impl ChannelSink {
    /// Create a sink and the receiver a consumer reads samples from.
    pub fn new(capacity: usize) -> (Self, Receiver<DistanceSample>) {
        let (sender, receiver) = bounded(capacity);
        (Self { sender }, receiver)
    }

    pub fn from_sender(sender: Sender<DistanceSample>) -> Self {
        Self { sender }
    }
}

impl SampleSink for ChannelSink {
    fn deliver(&mut self, sample: &DistanceSample) -> Result<(), SinkError> {
        self.sender.try_send(sample.clone()).map_err(|e| match e {
            TrySendError::Full(_) => SinkError::Rejected("queue full".to_string()),
            TrySendError::Disconnected(_) => SinkError::Disconnected,
        })
    }

    fn name(&self) -> &str {
        "channel"
    }
}
