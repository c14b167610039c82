//! Sample Hand-Off Queue
//!
//! The bridge between the blocking measurement thread and the tokio runtime.
//! The push half is owned by the measurement engine's OS thread and never
//! blocks or suspends; the pop half is owned by the broadcast dispatcher and
//! suspends cooperatively. This is the only structure shared between the two
//! scheduling domains.
//!
//! Overflow policy: the queue is unbounded. Crossing the configured
//! high-water mark logs a warning so a stalled consumer is visible, but the
//! producer is never throttled - stalling it would stall measurement itself.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

/// The push side was used after the hub stopped consuming samples.
#[derive(Debug, Error)]
#[error("sample queue closed")]
pub struct QueueClosed;

/// Factory for the two halves of the hand-off queue.
pub struct SampleQueue;

impl SampleQueue {
    /// Create a connected sender/receiver pair.
    ///
    /// `high_water` is the backlog depth at which the sender starts warning.
    pub fn channel(high_water: usize) -> (SampleSender, SampleReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let depth = Arc::new(AtomicUsize::new(0));

        (
            SampleSender {
                tx,
                depth: Arc::clone(&depth),
                high_water,
            },
            SampleReceiver { rx, depth },
        )
    }
}

/// Push half of the queue. Safe to use from any thread; never blocks.
#[derive(Clone)]
pub struct SampleSender {
    tx: mpsc::UnboundedSender<String>,
    depth: Arc<AtomicUsize>,
    high_water: usize,
}

impl SampleSender {
    /// Enqueue one raw sample record.
    ///
    /// Returns `Err(QueueClosed)` once the receiver is gone, which tells the
    /// measurement engine to stop producing.
    pub fn push(&self, raw: String) -> Result<(), QueueClosed> {
        // Count before sending so the gauge never underflows when the
        // consumer races the increment.
        let depth = self.depth.fetch_add(1, Ordering::Relaxed) + 1;

        if self.tx.send(raw).is_err() {
            self.depth.fetch_sub(1, Ordering::Relaxed);
            return Err(QueueClosed);
        }

        if depth == self.high_water {
            tracing::warn!(
                depth,
                "sample queue backlog reached high-water mark, consumer is falling behind"
            );
        }

        Ok(())
    }

    /// Current backlog depth (approximate under concurrency).
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }
}

/// Pop half of the queue. Owned by the single dispatcher task.
pub struct SampleReceiver {
    rx: mpsc::UnboundedReceiver<String>,
    depth: Arc<AtomicUsize>,
}

impl SampleReceiver {
    /// Wait for the next sample in push order.
    ///
    /// Returns `None` once every sender has been dropped; that is the
    /// terminal signal for the dispatcher loop.
    pub async fn pop(&mut self) -> Option<String> {
        let sample = self.rx.recv().await;
        if sample.is_some() {
            self.depth.fetch_sub(1, Ordering::Relaxed);
        }
        sample
    }

    /// Current backlog depth (approximate under concurrency).
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }
}
