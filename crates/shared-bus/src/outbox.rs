//! # Transactional Outbox
//!
//! Services that derive new events while applying a delivery stage them
//! here instead of publishing inline. The staged events are flushed only
//! after the local state change has committed, so a crash between apply
//! and publish never produces a world where the publish happened but the
//! apply did not.

use crate::bus::{BusError, EventPublisher};
use crate::events::MarketEvent;
use std::collections::VecDeque;
use std::sync::Mutex;
use tracing::debug;

/// FIFO buffer of events staged for publication.
pub struct Outbox {
    staged: Mutex<VecDeque<MarketEvent>>,
}

impl Outbox {
    /// Create an empty outbox.
    #[must_use]
    pub fn new() -> Self {
        Self {
            staged: Mutex::new(VecDeque::new()),
        }
    }

    /// Stage an event for publication on the next drain.
    pub fn stage(&self, event: MarketEvent) {
        let mut staged = self.staged.lock().unwrap_or_else(|p| p.into_inner());
        debug!(kind = event.kind(), pending = staged.len() + 1, "event staged");
        staged.push_back(event);
    }

    /// Publish all staged events in staging order.
    ///
    /// Returns the number published. On a publish failure the event is put
    /// back at the front and the error returned; the next drain resumes
    /// from the same event, preserving order.
    pub async fn drain(&self, bus: &dyn EventPublisher) -> Result<usize, BusError> {
        let mut published = 0;
        loop {
            let event = {
                let mut staged = self.staged.lock().unwrap_or_else(|p| p.into_inner());
                match staged.pop_front() {
                    Some(event) => event,
                    None => return Ok(published),
                }
            };
            if let Err(err) = bus.publish(event.clone()).await {
                let mut staged = self.staged.lock().unwrap_or_else(|p| p.into_inner());
                staged.push_front(event);
                return Err(err);
            }
            published += 1;
        }
    }

    /// Number of staged events awaiting publication.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.staged.lock().map(|q| q.len()).unwrap_or(0)
    }
}

impl Default for Outbox {
    fn default() -> Self {
        Self::new()
    }
}
