use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Error raised while decoding wire messages or recorded sessions.
#[derive(Debug, Error)]
pub enum ProtoError {
    #[error("message is not a JSON object")]
    NotAnObject,
    #[error("message has no string `type` field")]
    MissingType,
    #[error("message is missing required field `{0}`")]
    MissingField(&'static str),
    #[error("field `{field}` is invalid: {reason}")]
    InvalidField { field: &'static str, reason: String },
    #[error("failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("session line {line}: {source}")]
    SessionLine {
        line: usize,
        #[source]
        source: Box<ProtoError>,
    },
    #[error("failed to read session from {path:?}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
