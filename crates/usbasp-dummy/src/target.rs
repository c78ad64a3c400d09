//! In-memory AVR target
//!
//! Emulates the memories of an AVR device as seen through its serial
//! programming interface. Byte-level accesses made by the programmer core
//! land directly in flash and EEPROM arrays; paged writes are held in a
//! page buffer until flushed. Raw instructions sent through `transmit` are
//! decoded for the handful of instructions a host issues outside of
//! streaming sessions (programming enable, signature, chip erase, reads).

use usbasp_core::driver::IspDriver;
use usbasp_core::protocol::SckOption;

/// Programming enable instruction, first two bytes
const ISP_PROG_ENABLE: [u8; 2] = [0xAC, 0x53];
/// Chip erase instruction, first two bytes
const ISP_CHIP_ERASE: [u8; 2] = [0xAC, 0x80];
/// Read signature byte
const ISP_READ_SIGNATURE: u8 = 0x30;
/// Read flash, low byte of the word
const ISP_READ_FLASH_LOW: u8 = 0x20;
/// Read flash, high byte of the word
const ISP_READ_FLASH_HIGH: u8 = 0x28;
/// Read EEPROM byte
const ISP_READ_EEPROM: u8 = 0xA0;

/// Configuration for the dummy target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DummyConfig {
    /// Flash size in bytes
    pub flash_size: usize,
    /// EEPROM size in bytes
    pub eeprom_size: usize,
    /// Device signature bytes
    pub signature: [u8; 3],
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            flash_size: 32 * 1024, // ATmega328P
            eeprom_size: 1024,
            signature: [0x1E, 0x95, 0x0F],
        }
    }
}

/// Something the target observed, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetEvent {
    /// ISP lines driven
    Connect,
    /// ISP lines released
    Disconnect,
    /// SCK option selected
    SetSck(SckOption),
    /// Programming enable handshake
    ProgrammingEnable,
    /// Flash byte written into the page buffer or committed
    FlashWrite {
        /// Byte address
        address: u32,
        /// Value
        data: u8,
        /// Whether the byte was committed immediately
        commit: bool,
    },
    /// Page buffer programmed
    PageFlush {
        /// Address passed with the flush
        address: u32,
        /// Last byte loaded
        data: u8,
    },
    /// EEPROM byte written
    EepromWrite {
        /// Byte address
        address: u32,
        /// Value
        data: u8,
    },
    /// Chip erase executed
    ChipErase,
}

/// Dummy AVR target
///
/// Emulates an AVR in memory for testing purposes.
pub struct DummyTarget {
    config: DummyConfig,
    flash: Vec<u8>,
    eeprom: Vec<u8>,
    page_buffer: Vec<(u32, u8)>,
    instruction: Vec<u8>,
    connected: bool,
    events: Vec<TargetEvent>,
}

impl DummyTarget {
    /// Create an erased target with the given configuration
    pub fn new(config: DummyConfig) -> Self {
        let flash = vec![0xFF; config.flash_size];
        let eeprom = vec![0xFF; config.eeprom_size];
        Self {
            config,
            flash,
            eeprom,
            page_buffer: Vec::new(),
            instruction: Vec::with_capacity(4),
            connected: false,
            events: Vec::new(),
        }
    }

    /// Create a target with the default configuration (ATmega328P)
    pub fn new_default() -> Self {
        Self::new(DummyConfig::default())
    }

    /// Create a target with pre-filled flash
    pub fn with_flash(config: DummyConfig, initial: &[u8]) -> Self {
        let mut target = Self::new(config);
        let len = core::cmp::min(initial.len(), target.flash.len());
        target.flash[..len].copy_from_slice(&initial[..len]);
        target
    }

    /// The configuration
    pub fn config(&self) -> &DummyConfig {
        &self.config
    }

    /// Flash contents
    pub fn flash(&self) -> &[u8] {
        &self.flash
    }

    /// Flash contents, mutably
    pub fn flash_mut(&mut self) -> &mut [u8] {
        &mut self.flash
    }

    /// EEPROM contents
    pub fn eeprom(&self) -> &[u8] {
        &self.eeprom
    }

    /// EEPROM contents, mutably
    pub fn eeprom_mut(&mut self) -> &mut [u8] {
        &mut self.eeprom
    }

    /// Whether the ISP lines are driven
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Bytes loaded into the page buffer and not yet flushed
    pub fn pending_page_bytes(&self) -> usize {
        self.page_buffer.len()
    }

    /// Everything the target observed so far
    pub fn events(&self) -> &[TargetEvent] {
        &self.events
    }

    /// Addresses of all page flushes so far
    pub fn flush_addresses(&self) -> Vec<u32> {
        self.events
            .iter()
            .filter_map(|event| match event {
                TargetEvent::PageFlush { address, .. } => Some(*address),
                _ => None,
            })
            .collect()
    }

    /// Forget the recorded events
    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    fn flash_index(&self, address: u32) -> usize {
        address as usize % self.flash.len().max(1)
    }

    fn eeprom_index(&self, address: u32) -> usize {
        address as usize % self.eeprom.len().max(1)
    }

    fn program_flash(&mut self, address: u32, data: u8) {
        if self.flash.is_empty() {
            return;
        }
        let index = self.flash_index(address);
        // Programming can only clear bits
        self.flash[index] &= data;
    }

    fn chip_erase(&mut self) {
        self.flash.fill(0xFF);
        self.eeprom.fill(0xFF);
        self.page_buffer.clear();
        self.events.push(TargetEvent::ChipErase);
    }

    /// Answer the byte just appended to the current instruction
    fn instruction_response(&mut self) -> u8 {
        let index = self.instruction.len() - 1;
        if index == 0 {
            return 0x00;
        }
        // In sync: byte n echoes byte n - 1
        let echo = self.instruction[index - 1];
        if index < 3 {
            return echo;
        }

        let (opcode, hi, lo) = (self.instruction[0], self.instruction[1], self.instruction[2]);
        let address = u16::from_be_bytes([hi, lo]) as u32;
        match opcode {
            ISP_READ_SIGNATURE => self
                .config
                .signature
                .get(lo as usize)
                .copied()
                .unwrap_or(0xFF),
            ISP_READ_FLASH_LOW => self.read_flash(address * 2),
            ISP_READ_FLASH_HIGH => self.read_flash(address * 2 + 1),
            ISP_READ_EEPROM => self.read_eeprom(address),
            _ => echo,
        }
    }
}

impl IspDriver for DummyTarget {
    fn connect(&mut self) {
        self.connected = true;
        self.instruction.clear();
        self.events.push(TargetEvent::Connect);
    }

    fn disconnect(&mut self) {
        self.connected = false;
        self.events.push(TargetEvent::Disconnect);
    }

    fn transmit(&mut self, byte: u8) -> u8 {
        if !self.connected {
            return 0xFF;
        }

        self.instruction.push(byte);
        let response = self.instruction_response();

        if self.instruction.len() == 4 {
            if self.instruction[..2] == ISP_CHIP_ERASE {
                log::debug!("dummy: chip erase");
                self.chip_erase();
            }
            self.instruction.clear();
        }

        response
    }

    fn enter_programming_mode(&mut self) -> u8 {
        if !self.connected {
            return 1;
        }
        self.instruction.clear();
        for byte in [ISP_PROG_ENABLE[0], ISP_PROG_ENABLE[1], 0, 0] {
            self.transmit(byte);
        }
        self.events.push(TargetEvent::ProgrammingEnable);
        0
    }

    fn read_flash(&mut self, address: u32) -> u8 {
        if self.flash.is_empty() {
            return 0xFF;
        }
        self.flash[self.flash_index(address)]
    }

    fn read_eeprom(&mut self, address: u32) -> u8 {
        if self.eeprom.is_empty() {
            return 0xFF;
        }
        self.eeprom[self.eeprom_index(address)]
    }

    fn write_flash(&mut self, address: u32, data: u8, commit: bool) {
        self.events.push(TargetEvent::FlashWrite {
            address,
            data,
            commit,
        });
        if commit {
            self.program_flash(address, data);
        } else {
            self.page_buffer.push((address, data));
        }
    }

    fn flush_page(&mut self, address: u32, data: u8) {
        self.events.push(TargetEvent::PageFlush { address, data });
        for (addr, value) in core::mem::take(&mut self.page_buffer) {
            self.program_flash(addr, value);
        }
    }

    fn write_eeprom(&mut self, address: u32, data: u8) {
        self.events.push(TargetEvent::EepromWrite { address, data });
        if !self.eeprom.is_empty() {
            let index = self.eeprom_index(address);
            self.eeprom[index] = data;
        }
    }

    fn set_sck_option(&mut self, option: SckOption) {
        self.events.push(TargetEvent::SetSck(option));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transmit4(target: &mut DummyTarget, bytes: [u8; 4]) -> [u8; 4] {
        bytes.map(|b| target.transmit(b))
    }

    #[test]
    fn test_programming_enable_echo() {
        let mut target = DummyTarget::new_default();
        assert_eq!(target.enter_programming_mode(), 1);

        target.connect();
        assert_eq!(target.enter_programming_mode(), 0);
        let answer = transmit4(&mut target, [0xAC, 0x53, 0x00, 0x00]);
        assert_eq!(answer[2], 0x53);
    }

    #[test]
    fn test_read_signature() {
        let mut target = DummyTarget::new_default();
        target.connect();
        let sig: Vec<u8> = (0..3)
            .map(|i| transmit4(&mut target, [0x30, 0x00, i, 0x00])[3])
            .collect();
        assert_eq!(sig, [0x1E, 0x95, 0x0F]);
    }

    #[test]
    fn test_word_addressed_flash_read() {
        let mut target = DummyTarget::with_flash(DummyConfig::default(), &[0x0C, 0x94, 0x34, 0x00]);
        target.connect();
        assert_eq!(transmit4(&mut target, [0x20, 0x00, 0x01, 0x00])[3], 0x34);
        assert_eq!(transmit4(&mut target, [0x28, 0x00, 0x00, 0x00])[3], 0x94);
    }

    #[test]
    fn test_chip_erase() {
        let mut target = DummyTarget::with_flash(DummyConfig::default(), &[0u8; 16]);
        target.eeprom_mut()[0] = 0x12;
        target.connect();
        transmit4(&mut target, [0xAC, 0x80, 0x00, 0x00]);
        assert!(target.flash().iter().all(|&b| b == 0xFF));
        assert_eq!(target.eeprom()[0], 0xFF);
        assert_eq!(target.events().last(), Some(&TargetEvent::ChipErase));
    }

    #[test]
    fn test_page_buffer_commits_on_flush() {
        let mut target = DummyTarget::new_default();
        target.write_flash(0x40, 0x12, false);
        target.write_flash(0x41, 0x34, false);
        assert_eq!(target.read_flash(0x40), 0xFF);
        assert_eq!(target.pending_page_bytes(), 2);

        target.flush_page(0x41, 0x34);
        assert_eq!(&target.flash()[0x40..0x42], &[0x12, 0x34]);
        assert_eq!(target.pending_page_bytes(), 0);
        assert_eq!(target.flush_addresses(), [0x41]);
    }

    #[test]
    fn test_flash_programming_clears_bits_only() {
        let mut target = DummyTarget::new_default();
        target.write_flash(0, 0xF0, true);
        target.write_flash(0, 0x3C, true);
        assert_eq!(target.read_flash(0), 0x30);
    }
}
