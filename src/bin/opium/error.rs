//! Error types for the `opium` tool.

use opium_sdk::error::ApiError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Environment configuration error: {0}")]
    EnvConfig(#[from] envy::Error),

    #[error("Opium API error: {0}")]
    Api(#[from] ApiError),

    #[error("Command requires OPIUM_PUBLIC_KEY and OPIUM_PRIVATE_KEY")]
    MissingCredentials,

    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    #[error("Stream task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Output error: {0}")]
    Output(#[from] serde_json::Error),

    #[error("Stream closed unexpectedly")]
    StreamClosed,
}

pub type Result<T> = std::result::Result<T, Error>;
