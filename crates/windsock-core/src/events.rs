//! Broadcast event channel for station activity.
//!
//! The supervisor publishes everything observable through a single
//! [`EventDispatcher`]; any number of consumers subscribe and receive their
//! own copy of each event. Slow consumers lag and drop old events rather than
//! back-pressuring the read loop.

use tokio::sync::broadcast;
use tracing::trace;

use windsock_types::{ConnectionState, ProcessedSample};

use crate::transport::DeviceDescriptor;

const DEFAULT_CAPACITY: usize = 256;

/// Events emitted by a running station connection.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum StationEvent {
    /// The connection lifecycle state changed.
    StateChanged(ConnectionState),
    /// A session was established with the given device.
    Connected(DeviceDescriptor),
    /// A complete frame was extracted from the byte stream, before parsing.
    RawFrame(String),
    /// A sample passed the pipeline and was analyzed.
    Sample(ProcessedSample),
    /// A human-readable notice (connect failures, parse troubles).
    Notice(String),
}

/// Fan-out hub built on a tokio broadcast channel.
#[derive(Debug, Clone)]
pub struct EventDispatcher {
    sender: broadcast::Sender<StationEvent>,
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl EventDispatcher {
    /// Create a dispatcher with the default buffer capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a dispatcher with an explicit per-subscriber buffer capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Open a new subscription. Events published before this call are not
    /// delivered.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StationEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all current subscribers.
    ///
    /// Publishing with no subscribers is not an error; the event is dropped.
    pub fn emit(&self, event: StationEvent) {
        trace!(?event, "emitting event");
        let _ = self.sender.send(event);
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
