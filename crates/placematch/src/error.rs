use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlacematchError {
    #[error("Data processing error: {0}")]
    DataProcessing(#[from] placematch_data_processing::DataError),
    #[error("Index build error: {0}")]
    Build(#[from] crate::index::BuildError),
    #[error("Index format error: {0}")]
    Format(#[from] crate::index::FormatError),
    #[error("Index error: {0}")]
    IndexError(#[from] crate::index::IndexError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Init Logging error: {0}")]
    InitLoggingError(#[from] tracing_subscriber::filter::ParseError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, PlacematchError>;
