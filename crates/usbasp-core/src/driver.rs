//! Collaborator traits
//!
//! The command core never touches hardware directly. It talks to:
//!
//! - an [`IspDriver`] that clocks bytes into the target's serial
//!   programming interface
//! - a [`Board`] that owns the status LEDs, the slow-SCK jumper and the
//!   clock source
//!
//! The USB side is described in [`crate::firmware`].

use crate::protocol::SckOption;

/// ISP driver trait
///
/// This trait represents the byte level programming interface of an AVR
/// target. Each call is one complete ISP instruction (or sequence of
/// instructions); timing and pin handling are entirely up to the
/// implementation.
///
/// ## Paged flash
///
/// Devices with paged flash are written in two steps. [`write_flash`]
/// with `commit == false` loads a byte into the target's page buffer, and
/// [`flush_page`] programs the buffer into the page containing `address`.
/// Devices without page buffers get `commit == true` and must make the
/// byte durable before returning.
///
/// [`write_flash`]: IspDriver::write_flash
/// [`flush_page`]: IspDriver::flush_page
pub trait IspDriver {
    /// Drive the ISP lines and hold the target in reset
    fn connect(&mut self);

    /// Release the ISP lines and the target's reset
    fn disconnect(&mut self);

    /// Shift one byte out and return the byte shifted in
    fn transmit(&mut self, byte: u8) -> u8;

    /// Send the programming enable instruction
    ///
    /// Returns 0 when the target answered in sync, non-zero otherwise.
    fn enter_programming_mode(&mut self) -> u8;

    /// Read one flash byte
    fn read_flash(&mut self, address: u32) -> u8;

    /// Read one EEPROM byte
    fn read_eeprom(&mut self, address: u32) -> u8;

    /// Write one flash byte, either into the page buffer or durably
    fn write_flash(&mut self, address: u32, data: u8, commit: bool);

    /// Program the page buffer into the page containing `address`
    ///
    /// `data` is the last byte loaded, which some devices poll for
    /// completion.
    fn flush_page(&mut self, address: u32, data: u8);

    /// Write one EEPROM byte durably
    fn write_eeprom(&mut self, address: u32, data: u8);

    /// Select the SCK speed for following ISP instructions
    fn set_sck_option(&mut self, option: SckOption);
}

/// Board trait
///
/// Everything on the programmer PCB that is not the ISP connector.
pub trait Board {
    /// Switch the "active" (red) LED
    fn set_active_led(&mut self, on: bool);

    /// Switch the "idle" (green) LED
    fn set_idle_led(&mut self, on: bool);

    /// Whether the slow-SCK jumper pulls the speed-select input low
    fn slow_sck_forced(&self) -> bool;

    /// Start the timer that clocks ISP delays
    fn init_clock(&mut self);
}
