use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum UtilError {
    #[error("No files matched pattern: {pattern}")]
    EmptyResult {
        pattern: String,
    },

    #[error("Worker failed: {task} - {message}")]
    WorkerFailure {
        task: String,
        message: String,
    },

    #[error("Path error: {path:?} - {message}")]
    PathError {
        path: PathBuf,
        message: String,
    },

    #[error("File error: {path:?} - {message}")]
    FileError {
        path: PathBuf,
        message: String,
    },

    #[error("Parse error: {path:?} - {message}")]
    ParseError {
        path: PathBuf,
        message: String,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Timeout error: {operation} exceeded {seconds} seconds")]
    TimeoutError {
        operation: String,
        seconds: u64,
    },

    #[error("External tool error: {tool} - {message}")]
    ExternalToolError {
        tool: String,
        message: String,
    },

    #[error("Unexpected error: {0}")]
    UnexpectedError(String),
}

impl From<anyhow::Error> for UtilError {
    fn from(error: anyhow::Error) -> Self {
        UtilError::UnexpectedError(format!("{:#}", error))
    }
}

pub type UtilResult<T> = std::result::Result<T, UtilError>;
