//! Programming session state
//!
//! A [`Session`] is the single record shared by the command dispatcher and
//! the streaming handlers. Opening a session always replaces whatever was
//! open before, so at most one read or write is in flight at any time.

use core::fmt;

use heapless::Vec;

use crate::protocol::{BlockFlags, SckOption, WriteParams, REPLY_BUFFER_LEN};

/// What the programmer is currently doing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ProgState {
    /// No session open
    #[default]
    Idle,
    /// Streaming flash contents to the host
    ReadingFlash,
    /// Streaming EEPROM contents to the host
    ReadingEeprom,
    /// Receiving flash contents from the host
    WritingFlash,
    /// Receiving EEPROM contents from the host
    WritingEeprom,
}

impl ProgState {
    /// Whether a read session is open
    pub const fn is_reading(self) -> bool {
        matches!(self, Self::ReadingFlash | Self::ReadingEeprom)
    }

    /// Whether a write session is open
    pub const fn is_writing(self) -> bool {
        matches!(self, Self::WritingFlash | Self::WritingEeprom)
    }
}

impl fmt::Display for ProgState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::ReadingFlash => write!(f, "reading flash"),
            Self::ReadingEeprom => write!(f, "reading EEPROM"),
            Self::WritingFlash => write!(f, "writing flash"),
            Self::WritingEeprom => write!(f, "writing EEPROM"),
        }
    }
}

/// Memory addressed by a read or write session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Memory {
    /// Program flash
    Flash,
    /// Data EEPROM
    Eeprom,
}

/// The in-flight programming operation
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub(crate) state: ProgState,
    pub(crate) address: u32,
    pub(crate) long_address: bool,
    pub(crate) remaining: u16,
    pub(crate) page_size: u16,
    pub(crate) page_counter: u16,
    pub(crate) block_flags: BlockFlags,
    pub(crate) sck: SckOption,
    pub(crate) reply: Vec<u8, REPLY_BUFFER_LEN>,
}

impl Session {
    /// Create an idle session with the default SCK option
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state
    pub fn state(&self) -> ProgState {
        self.state
    }

    /// Address of the next byte to transfer
    pub fn address(&self) -> u32 {
        self.address
    }

    /// Whether addresses come from `SetLongAddress` only
    pub fn long_address_mode(&self) -> bool {
        self.long_address
    }

    /// Bytes left before the session completes
    pub fn remaining(&self) -> u16 {
        self.remaining
    }

    /// Flash page size of the current write, 0 when unpaged
    pub fn page_size(&self) -> u16 {
        self.page_size
    }

    /// Bytes left until the current page is flushed
    pub fn page_counter(&self) -> u16 {
        self.page_counter
    }

    /// Block flags of the current write
    pub fn block_flags(&self) -> BlockFlags {
        self.block_flags
    }

    /// SCK option applied on the next connect
    pub fn sck_option(&self) -> SckOption {
        self.sck
    }

    /// Contents of the reply buffer
    pub fn reply(&self) -> &[u8] {
        &self.reply
    }

    /// Take the address from a 16-bit request field unless long address
    /// mode is active
    pub(crate) fn load_short_address(&mut self, address: u32) {
        if !self.long_address {
            self.address = address;
        }
    }

    /// Switch to long address mode. There is no way back short of a new
    /// connect.
    pub(crate) fn set_long_address(&mut self, address: u32) {
        self.long_address = true;
        self.address = address;
    }

    pub(crate) fn open_read(&mut self, memory: Memory, length: u16) {
        self.replace_state(match memory {
            Memory::Flash => ProgState::ReadingFlash,
            Memory::Eeprom => ProgState::ReadingEeprom,
        });
        self.remaining = length;
    }

    pub(crate) fn open_flash_write(&mut self, params: WriteParams, length: u16) {
        self.page_size = params.page_size;
        self.block_flags = params.flags;
        if params.flags.contains(BlockFlags::FIRST) {
            self.page_counter = params.page_size;
        }
        self.remaining = length;
        self.replace_state(ProgState::WritingFlash);
    }

    pub(crate) fn open_eeprom_write(&mut self, length: u16) {
        self.page_size = 0;
        self.block_flags = BlockFlags::empty();
        self.remaining = length;
        self.replace_state(ProgState::WritingEeprom);
    }

    pub(crate) fn close(&mut self) {
        log::debug!(
            "session: {} finished at 0x{:08X}",
            self.state,
            self.address
        );
        self.state = ProgState::Idle;
    }

    /// Clear the reply buffer and copy `data` into it
    pub(crate) fn set_reply(&mut self, data: &[u8]) {
        self.reply.clear();
        let _ = self.reply.extend_from_slice(data);
    }

    fn replace_state(&mut self, state: ProgState) {
        if self.state != ProgState::Idle {
            log::debug!("session: {} abandoned for {}", self.state, state);
        }
        self.state = state;
    }
}
