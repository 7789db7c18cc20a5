#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request never produced a response (connect, timeout, TLS...).
    #[error("request error: {0}")]
    Request(String),

    /// Non-2xx response. `message` is the server's `error` field, or the raw
    /// body when it has none.
    #[error("{op} failed with status {status}: {message}")]
    Status {
        op: &'static str,
        status: u16,
        message: String,
    },

    #[error("decode error: {0}")]
    Decode(String),

    #[error("invalid upload: {0}")]
    InvalidUpload(String),

    #[error("client error: {0}")]
    Client(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    /// HTTP status of a rejected request.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
