pub type Result<T> = std::result::Result<T, Error>;

/// Errors are `Clone` so a channel outcome can be observed by any number of
/// shared readers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("task panicked: {0}")]
    TaskPanicked(String),

    #[error("queue closed")]
    QueueClosed,

    #[error("task cancelled before execution")]
    Cancelled,

    #[error("result channel already set")]
    DoubleSet,

    #[error("{0} requires a different scheduling policy")]
    Unsupported(&'static str),

    #[error("config error: {0}")]
    Config(String),

    #[error("executor error: {0}")]
    Executor(String),
}

impl Error {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    pub fn executor<S: Into<String>>(msg: S) -> Self {
        Error::Executor(msg.into())
    }
}
