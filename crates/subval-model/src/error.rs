use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("unknown data type: {0}")]
    UnknownDataType(String),
    #[error("unknown file type: {0}")]
    UnknownFileType(String),
}

pub type Result<T> = std::result::Result<T, ModelError>;
