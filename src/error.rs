use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpeedtestError {
    /// The speedtest process could not be started, exited non-zero or timed out.
    #[error("speedtest failed: {0}")]
    ExecutionFailed(String),

    /// stdout did not decode into the expected result shape.
    #[error("failed to decode speedtest output: {0}")]
    DecodeFailed(#[from] serde_json::Error),

    #[error("failed to encode metrics: {0}")]
    Exposition(#[from] prometheus::Error),
}

impl From<std::io::Error> for SpeedtestError {
    fn from(err: std::io::Error) -> Self {
        SpeedtestError::ExecutionFailed(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SpeedtestError>;
