#[derive(Debug, thiserror::Error)]
pub enum DeskError {
    #[error("api error: {0}")]
    Api(#[from] docs_api::ApiError),

    #[error("channel error: {0}")]
    Channel(#[from] socket_channel::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type DeskResult<T> = Result<T, DeskError>;
