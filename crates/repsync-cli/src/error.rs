use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] repsync_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Operation payload cannot be empty")]
    EmptyPayload,
    #[error("Invalid id: {0}")]
    InvalidId(String),
    #[error("Could not determine a data directory for the local database")]
    NoDataDir,
    #[error(
        "Remote sync is not configured. Set REPSYNC_API_URL (and optionally REPSYNC_API_TOKEN)."
    )]
    RemoteNotConfigured,
}
