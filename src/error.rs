use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RecorderError>;

#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("Capture device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("No encoder executable found beside the application or on PATH")]
    EncoderNotFound,

    #[error("Encoder exited with code {exit_code}:\n{diagnostic_tail}")]
    EncoderProcessFailure {
        exit_code: i32,
        diagnostic_tail: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Graceful stop exceeded the {0:?} grace period")]
    StopTimeout(Duration),

    #[error("Failed to Start the Recording Session, reason: {0}")]
    FailedToStart(String),

    #[error("Generic Error: {0}")]
    Generic(String),
}
