//! Bench error types

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the `usbasp` bench
#[derive(Debug, Error)]
pub enum BenchError {
    /// Reading or writing a file failed
    #[error("{}: {source}", path.display())]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The target description could not be parsed
    #[error("invalid target config: {0}")]
    Config(#[from] toml::de::Error),

    /// A transcript line could not be parsed
    #[error("line {line}: {message}")]
    Script {
        /// 1-based line number
        line: usize,
        /// What went wrong
        message: String,
    },

    /// The flash image does not fit the emulated target
    #[error("flash image is {len} bytes but the target has {capacity}")]
    ImageTooLarge {
        /// Image size
        len: usize,
        /// Flash size of the target
        capacity: usize,
    },

    /// Some transfers were stalled by the device
    #[error("{count} transfer(s) stalled")]
    Stalled {
        /// Number of stalled transfers
        count: usize,
    },
}

impl BenchError {
    /// Wrap an I/O error with the path it happened on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
