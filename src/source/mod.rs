//! Sample Sources
//!
//! The boundary to the bandwidth-measurement engine. A source blocks while
//! waiting for the next sample, so it always runs on its own OS thread,
//! never on the tokio runtime; the only thing it shares with the hub is the
//! push half of the sample queue. When the source exits and drops its
//! sender, the queue closes and the dispatcher shuts down with it.

mod command;
mod error;

pub use command::CommandSource;
pub use error::SourceError;

use crate::bridge::SampleSender;

/// A blocking producer of raw sample records.
pub trait SampleSource: Send {
    /// Produce samples into `out` until the engine stops or the queue
    /// closes. Blocks the calling thread.
    fn run(&mut self, out: SampleSender) -> Result<(), SourceError>;
}

/// Run a source on a dedicated OS thread.
///
/// The thread owns the push half of the queue; the queue closes when the
/// thread exits (and no other sender is alive).
pub fn spawn_source<S>(
    mut source: S,
    out: SampleSender,
) -> std::io::Result<std::thread::JoinHandle<Result<(), SourceError>>>
where
    S: SampleSource + 'static,
{
    std::thread::Builder::new()
        .name("bandcast-source".to_string())
        .spawn(move || {
            let result = source.run(out);
            match &result {
                Ok(()) => tracing::info!("sample source finished"),
                Err(SourceError::QueueClosed) => {
                    tracing::debug!("hub stopped before the sample source finished")
                }
                Err(e) => tracing::error!(error = %e, "sample source failed"),
            }
            result
        })
}
