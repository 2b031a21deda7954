use std::path::PathBuf;
use std::time::Duration;

/// Errors that can occur in session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The operation needs a connected session.
    #[error("not connected")]
    NotConnected,

    /// `connect` was called on a connected session.
    #[error("already connected")]
    AlreadyConnected,

    /// Command parameters were rejected before sending.
    #[error("invalid command: {0}")]
    Validation(#[from] netsdr_codec::ValidationError),

    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] netsdr_transport::TransportError),

    /// The telemetry output file could not be created.
    #[error("failed to open telemetry output {}: {source}", .path.display())]
    Output {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A background thread could not be started.
    #[error("failed to start {name} thread: {source}")]
    Spawn {
        name: &'static str,
        source: std::io::Error,
    },

    /// The device did not answer a command in time.
    #[error("no response within {0:?}")]
    ResponseTimeout(Duration),

    /// The control listener exited, so no response can arrive.
    #[error("control listener stopped")]
    ListenerStopped,
}

pub type Result<T> = std::result::Result<T, SessionError>;
