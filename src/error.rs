//! Error types shared by every wavekit operation.

use std::io;
use thiserror::Error;

/// Result type alias for wavekit operations
pub type Result<T> = std::result::Result<T, Error>;

/// What the runner should do when an operation fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Reject the current file and keep going with the rest of the batch
    SkipFile,
    /// Stop the whole run
    AbortRun,
}

#[derive(Error, Debug)]
pub enum Error {
    /// Bad magic, unsupported format code or a header cut short
    #[error("invalid WAVE file [{file}]: {reason}")]
    Validation { file: String, reason: String },

    /// Incompatible inputs or a violated conservation check
    #[error("{0}")]
    Consistency(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    /// A bounded transfer stopped early
    #[error("{what}: expected {expected} bytes, got {actual}")]
    ShortTransfer {
        what: String,
        expected: u64,
        actual: u64,
    },

    /// Bad split points, out of range tracks, conflicting options
    #[error("{0}")]
    UserInput(String),

    #[error("configuration error: {0}")]
    Config(String),

    /// The file is fine but there is nothing this operation can do with it
    #[error("skipping [{file}]: {reason}")]
    Skipped { file: String, reason: String },
}

impl Error {
    pub fn validation<F: Into<String>, R: Into<String>>(file: F, reason: R) -> Self {
        Error::Validation {
            file: file.into(),
            reason: reason.into(),
        }
    }

    pub fn consistency<S: Into<String>>(msg: S) -> Self {
        Error::Consistency(msg.into())
    }

    pub fn user_input<S: Into<String>>(msg: S) -> Self {
        Error::UserInput(msg.into())
    }

    pub fn io<S: Into<String>>(context: S, source: io::Error) -> Self {
        Error::Io {
            context: context.into(),
            source,
        }
    }

    pub fn skipped<F: Into<String>, R: Into<String>>(file: F, reason: R) -> Self {
        Error::Skipped {
            file: file.into(),
            reason: reason.into(),
        }
    }

    pub fn short<S: Into<String>>(what: S, expected: u64, actual: u64) -> Self {
        Error::ShortTransfer {
            what: what.into(),
            expected,
            actual,
        }
    }

    /// Map the error kind to skip-this-file or abort-the-run.
    pub fn disposition(&self) -> Disposition {
        match self {
            Error::Validation { .. }
            | Error::Io { .. }
            | Error::ShortTransfer { .. }
            | Error::Skipped { .. } => Disposition::SkipFile,
            Error::Consistency(_) | Error::UserInput(_) | Error::Config(_) => Disposition::AbortRun,
        }
    }
}

impl From<io::Error> for Error {
    fn from(source: io::Error) -> Self {
        Error::Io {
            context: "I/O error".to_string(),
            source,
        }
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(e: toml::ser::Error) -> Self {
        Error::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disposition_by_kind() {
        assert_eq!(
            Error::validation("a.wav", "bad magic").disposition(),
            Disposition::SkipFile
        );
        assert_eq!(Error::short("data", 10, 4).disposition(), Disposition::SkipFile);
        assert_eq!(
            Error::io("open", io::Error::new(io::ErrorKind::NotFound, "gone")).disposition(),
            Disposition::SkipFile
        );
        assert_eq!(
            Error::skipped("b.wav", "already sector-aligned").disposition(),
            Disposition::SkipFile
        );
        assert_eq!(Error::consistency("sizes").disposition(), Disposition::AbortRun);
        assert_eq!(Error::user_input("offsets").disposition(), Disposition::AbortRun);
    }

    #[test]
    fn test_validation_message_names_file() {
        let e = Error::validation("track01.wav", "missing \"data\" chunk");
        assert_eq!(
            e.to_string(),
            "invalid WAVE file [track01.wav]: missing \"data\" chunk"
        );
    }
}
