//! usbasp-core - Command and session core for the USBasp programmer
//!
//! This crate implements the firmware side of the USBasp protocol: it
//! decodes vendor control requests coming from the host, keeps track of the
//! programming session that spans many USB transactions, and turns streamed
//! data packets into byte-wise flash and EEPROM accesses on the target AVR.
//!
//! The USB stack, the ISP bit-level driver and the board hardware are
//! collaborators described by the traits in [`driver`]. The crate is
//! `no_std` and allocation free.
//!
//! # Features
//!
//! - `std` - Implement `std::error::Error` for [`Error`]
//!
//! # Example
//!
//! ```ignore
//! use usbasp_core::Programmer;
//!
//! let mut programmer = Programmer::new(isp, board);
//! programmer.init(&mut usb);
//! programmer.run(&mut usb);
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(any(test, feature = "std"))]
extern crate std;

pub mod dispatch;
pub mod driver;
pub mod error;
pub mod firmware;
pub mod protocol;
pub mod request;
pub mod session;
pub mod stream;

#[cfg(test)]
mod mock;

pub use dispatch::{Programmer, Reply};
pub use error::{Error, Result};
pub use session::{ProgState, Session};
