//! Broadcast Dispatcher
//!
//! The single task that drains the sample queue and fans each record out to
//! every currently interested connection. A send is a non-blocking enqueue
//! onto the connection's outbound channel, so a slow viewer delays nobody:
//! its own writer task absorbs the backlog and its supervisor tears the
//! connection down when the transport finally fails.

use std::sync::Arc;

use crate::bridge::SampleReceiver;
use crate::hub::messages;
use crate::hub::registry::ConnectionRegistry;

/// Drains the sample queue and broadcasts to the registry.
pub struct Dispatcher {
    samples: SampleReceiver,
    registry: Arc<ConnectionRegistry>,
}

impl Dispatcher {
    pub fn new(samples: SampleReceiver, registry: Arc<ConnectionRegistry>) -> Self {
        Self { samples, registry }
    }

    /// Run until the sample queue closes.
    ///
    /// Queue closure means no further samples can ever be delivered; the
    /// caller treats this as fatal for the whole hub.
    pub async fn run(mut self) {
        let mut dispatched: u64 = 0;

        while let Some(raw) = self.samples.pop().await {
            self.broadcast(raw).await;
            dispatched += 1;
        }

        tracing::info!(dispatched, "sample queue closed, dispatcher exiting");
    }

    /// One broadcast pass: deliver a single sample to every eligible
    /// connection. A failed enqueue on one connection never aborts delivery
    /// to the rest; that connection's supervisor handles its teardown.
    async fn broadcast(&self, raw: String) {
        let device = match messages::device_name(&raw) {
            Some(device) => device,
            None => {
                tracing::warn!(record = %raw, "sample record has no device_name, skipping");
                return;
            }
        };

        for connection in self.registry.snapshot().await {
            if !connection.wants(&device) {
                continue;
            }

            if connection.sender.send(raw.clone()).is_err() {
                tracing::debug!(
                    connection_id = %connection.id,
                    "outbound channel closed, skipping viewer"
                );
            }
        }
    }
}
