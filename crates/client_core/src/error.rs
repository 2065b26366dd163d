use camelot_core::WorkerError;
use shared::Name;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Worker(#[from] WorkerError),
    #[error("cannot encode action mode: {0}")]
    Mode(#[from] serde_json::Error),
    #[error("no open table for model context {0}")]
    UnknownModel(Name),
    #[error("unknown gui run {0}")]
    UnknownRun(Name),
    #[error("gui run {0} has not reached the worker yet")]
    RunNotStarted(Name),
    #[error("timed out waiting for the worker")]
    Timeout,
    #[error("worker response channel closed")]
    Disconnected,
}

pub type Result<T> = std::result::Result<T, ClientError>;
