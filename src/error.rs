use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("io error: {0}")]
    IO(#[from] std::io::Error),
    #[error("[line {line}] lexical error: {message}")]
    Lexical { line: usize, message: String },
    #[error("[line {line}] parse error {location}: {message}")]
    Parse {
        line: usize,
        location: String,
        message: String,
    },
    #[error("[line {line}] runtime error: {message}")]
    Runtime { line: usize, message: String },
}

impl Error {
    /// Source line the error is attributed to, if any.
    pub fn line(&self) -> Option<usize> {
        match self {
            Error::IO(_) => None,
            Error::Lexical { line, .. } | Error::Parse { line, .. } | Error::Runtime { line, .. } => {
                Some(*line)
            }
        }
    }

    pub fn is_runtime(&self) -> bool {
        matches!(self, Error::Runtime { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;

pub fn runtime_error<T>(line: usize, message: impl Into<String>) -> Result<T> {
    Err(Error::Runtime {
        line,
        message: message.into(),
    })
}
