//! usbasp-dummy - In-memory collaborators for usbasp-core
//!
//! This crate provides an emulated AVR target, a programmer board and a
//! USB loopback so the command core can be driven end to end without
//! hardware. It's useful for testing and for the `usbasp` bench.

mod board;
mod target;
mod usb;

pub use board::DummyBoard;
pub use target::{DummyConfig, DummyTarget, TargetEvent};
pub use usb::{Completed, LoopbackUsb, Transfer, TransferError};

use usbasp_core::Programmer;

/// Programmer wired to dummy collaborators
pub type DummyProgrammer = Programmer<DummyTarget, DummyBoard>;

/// Create a programmer around a fresh target and board
pub fn dummy_programmer(config: DummyConfig, slow_sck_jumper: bool) -> DummyProgrammer {
    Programmer::new(DummyTarget::new(config), DummyBoard::new(slow_sck_jumper))
}
