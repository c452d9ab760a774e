use std::{fmt, io::Error as IoError};

pub type GibsonResult<T> = Result<T, GibsonError>;

#[derive(Debug)]
pub enum GibsonError {
    Io(IoError),
    IoExtra(IoError, String),
    Config(String),
}

impl GibsonError {
    pub fn io_extra(ioe: IoError, extra: impl ToString) -> Self {
        Self::IoExtra(ioe, extra.to_string())
    }
    pub fn config(msg: impl ToString) -> Self {
        Self::Config(msg.to_string())
    }
}

impl fmt::Display for GibsonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::IoExtra(e, extra) => write!(f, "I/O error while {extra}: {e}"),
            Self::Config(msg) => write!(f, "configuration error: {msg}"),
        }
    }
}

impl std::error::Error for GibsonError {}

impl From<IoError> for GibsonError {
    fn from(e: IoError) -> Self {
        Self::Io(e)
    }
}
