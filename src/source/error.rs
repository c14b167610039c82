//! Sample source error types

use thiserror::Error;

/// Errors that can occur while running a sample source
#[derive(Debug, Error)]
pub enum SourceError {
    /// The measurement engine could not be started
    #[error("failed to start measurement engine `{program}`: {error}")]
    Spawn {
        program: String,
        #[source]
        error: std::io::Error,
    },

    /// Reading from the measurement engine failed
    #[error("failed to read from measurement engine: {0}")]
    Read(#[from] std::io::Error),

    /// The hub stopped consuming before the source finished
    #[error("sample queue closed before the source finished")]
    QueueClosed,
}
