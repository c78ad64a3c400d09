//! Recording collaborators for unit tests

use std::vec::Vec;

use crate::driver::{Board, IspDriver};
use crate::protocol::SckOption;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Connect,
    Disconnect,
    Transmit(u8),
    EnableProg,
    ReadFlash(u32),
    ReadEeprom(u32),
    WriteFlash(u32, u8, bool),
    Flush(u32, u8),
    WriteEeprom(u32, u8),
    SetSck(SckOption),
}

/// ISP driver that records every call. Flash reads return the low
/// address byte, transmit answers with the complement.
#[derive(Debug, Default)]
pub struct MockIsp {
    pub calls: Vec<Call>,
    pub enable_status: u8,
}

impl IspDriver for MockIsp {
    fn connect(&mut self) {
        self.calls.push(Call::Connect);
    }

    fn disconnect(&mut self) {
        self.calls.push(Call::Disconnect);
    }

    fn transmit(&mut self, byte: u8) -> u8 {
        self.calls.push(Call::Transmit(byte));
        !byte
    }

    fn enter_programming_mode(&mut self) -> u8 {
        self.calls.push(Call::EnableProg);
        self.enable_status
    }

    fn read_flash(&mut self, address: u32) -> u8 {
        self.calls.push(Call::ReadFlash(address));
        address as u8
    }

    fn read_eeprom(&mut self, address: u32) -> u8 {
        self.calls.push(Call::ReadEeprom(address));
        !(address as u8)
    }

    fn write_flash(&mut self, address: u32, data: u8, commit: bool) {
        self.calls.push(Call::WriteFlash(address, data, commit));
    }

    fn flush_page(&mut self, address: u32, data: u8) {
        self.calls.push(Call::Flush(address, data));
    }

    fn write_eeprom(&mut self, address: u32, data: u8) {
        self.calls.push(Call::WriteEeprom(address, data));
    }

    fn set_sck_option(&mut self, option: SckOption) {
        self.calls.push(Call::SetSck(option));
    }
}

#[derive(Debug, Default)]
pub struct MockBoard {
    pub active_led: bool,
    pub idle_led: bool,
    pub slow_jumper: bool,
    pub clock_started: bool,
}

impl Board for MockBoard {
    fn set_active_led(&mut self, on: bool) {
        self.active_led = on;
    }

    fn set_idle_led(&mut self, on: bool) {
        self.idle_led = on;
    }

    fn slow_sck_forced(&self) -> bool {
        self.slow_jumper
    }

    fn init_clock(&mut self) {
        self.clock_started = true;
    }
}
