use reqwest::StatusCode;
use tokio_tungstenite::tungstenite;

/// Error returned by REST calls, signing and socket subscriptions.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("empty {0}")]
    EmptyKey(&'static str),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("unprocessable entity: {0}")]
    UnprocessableEntity(String),

    #[error("too many requests: {0}")]
    TooManyRequests(String),

    #[error("unexpected status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("unexpected empty response from {0}")]
    EmptyResponse(&'static str),

    #[error("ticker is not traded: {0}")]
    UnknownTicker(String),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("signing error: {0}")]
    Signing(String),

    #[error("socket error: {0}")]
    Socket(String),

    #[error("socket protocol error: {0}")]
    Protocol(String),

    #[error("socket connection closed")]
    Closed,

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}

impl ApiError {
    /// Maps a non-success HTTP status and response body to an error.
    pub fn from_status(status: StatusCode, body: String) -> Self {
        match status {
            StatusCode::BAD_REQUEST => Self::InvalidRequest(body),
            StatusCode::UNAUTHORIZED => Self::Unauthorized(body),
            StatusCode::FORBIDDEN => Self::Forbidden(body),
            StatusCode::NOT_FOUND => Self::NotFound(body),
            StatusCode::CONFLICT => Self::Conflict(body),
            StatusCode::PRECONDITION_FAILED => Self::PreconditionFailed(body),
            StatusCode::UNPROCESSABLE_ENTITY => Self::UnprocessableEntity(body),
            StatusCode::TOO_MANY_REQUESTS => Self::TooManyRequests(body),
            _ => Self::UnexpectedStatus {
                status: status.as_u16(),
                body,
            },
        }
    }

    /// Whether the error was caused by a rejected or expired access token.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }
}

impl From<tungstenite::Error> for ApiError {
    fn from(value: tungstenite::Error) -> Self {
        match value {
            tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
                Self::Closed
            }
            _ => Self::Socket(value.to_string()),
        }
    }
}

impl From<alloy::signers::Error> for ApiError {
    fn from(value: alloy::signers::Error) -> Self {
        Self::Signing(value.to_string())
    }
}

impl From<alloy::signers::local::LocalSignerError> for ApiError {
    fn from(value: alloy::signers::local::LocalSignerError) -> Self {
        Self::Signing(value.to_string())
    }
}

impl From<alloy::dyn_abi::Error> for ApiError {
    fn from(value: alloy::dyn_abi::Error) -> Self {
        Self::Signing(value.to_string())
    }
}
