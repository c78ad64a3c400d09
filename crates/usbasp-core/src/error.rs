//! Error types for usbasp-core
//!
//! The firmware has no fatal conditions. The only errors are streaming
//! callbacks that arrive while no matching session is open, which the USB
//! layer answers with a STALL.

use core::fmt;

use crate::session::ProgState;

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A data packet was requested but no read session is open
    NoReadSession(ProgState),
    /// A data packet was delivered but no write session is open
    NoWriteSession(ProgState),
}

impl Error {
    /// The programmer state that was found when the packet arrived
    pub fn state(&self) -> ProgState {
        match self {
            Self::NoReadSession(state) | Self::NoWriteSession(state) => *state,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoReadSession(state) => {
                write!(f, "read packet requested while {}", state)
            }
            Self::NoWriteSession(state) => {
                write!(f, "write packet delivered while {}", state)
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
