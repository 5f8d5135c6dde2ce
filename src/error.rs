use thiserror::Error;

#[derive(Error, Debug)]
pub enum QbError {
    #[error("node not found: {0}")]
    NotFound(String),

    #[error("invalid target {id}: {reason}")]
    InvalidTarget { id: String, reason: String },

    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("cannot detect format: no file extension")]
    NoExtension,

    #[error("unknown file extension: .{0}")]
    UnknownExtension(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl QbError {
    pub(crate) fn invalid_target(id: impl Into<String>, reason: impl Into<String>) -> Self {
        QbError::InvalidTarget {
            id: id.into(),
            reason: reason.into(),
        }
    }
}
