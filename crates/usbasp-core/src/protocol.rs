//! USBasp protocol constants and types
//!
//! Function selectors travel in `bRequest` of a vendor control transfer.
//! Parameters use `wValue`, `wIndex` and `wLength` as described on each
//! function; see [`crate::request`] for the decoding.

use bitflags::bitflags;

/// Shared V-USB vendor ID used by USBasp
pub const USBASP_SHARED_VID: u16 = 0x16C0;
/// Shared V-USB product ID used by USBasp
pub const USBASP_SHARED_PID: u16 = 0x05DC;

/// Maximum payload of a low-speed control data packet
pub const MAX_PACKET_SIZE: usize = 8;

/// Size of the reply scratch buffer
pub const REPLY_BUFFER_LEN: usize = 8;

/// Reply length telling the USB driver that a data stage is streamed
/// through the read/write callbacks. Returned from the read/write callbacks
/// it makes the driver STALL the transfer instead.
pub const STREAM_SENTINEL: u8 = 0xFF;

/// Status byte returned by `SetIspSck`
pub const SCK_STATUS_OK: u8 = 0;

// Function selectors
/// Connect to the target (drive ISP lines, apply SCK speed)
pub const USBASP_FUNC_CONNECT: u8 = 1;
/// Release the ISP lines
pub const USBASP_FUNC_DISCONNECT: u8 = 2;
/// Exchange four raw ISP bytes
pub const USBASP_FUNC_TRANSMIT: u8 = 3;
/// Stream flash contents to the host
pub const USBASP_FUNC_READFLASH: u8 = 4;
/// Send the programming enable instruction
pub const USBASP_FUNC_ENABLEPROG: u8 = 5;
/// Stream flash contents from the host
pub const USBASP_FUNC_WRITEFLASH: u8 = 6;
/// Stream EEPROM contents to the host
pub const USBASP_FUNC_READEEPROM: u8 = 7;
/// Stream EEPROM contents from the host
pub const USBASP_FUNC_WRITEEEPROM: u8 = 8;
/// Switch to 32-bit addressing and set the address
pub const USBASP_FUNC_SETLONGADDRESS: u8 = 9;
/// Select the ISP clock option used on the next connect
pub const USBASP_FUNC_SETISPSCK: u8 = 10;

/// Decoded function selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Function {
    /// [`USBASP_FUNC_CONNECT`]
    Connect,
    /// [`USBASP_FUNC_DISCONNECT`]
    Disconnect,
    /// [`USBASP_FUNC_TRANSMIT`]
    Transmit,
    /// [`USBASP_FUNC_READFLASH`]
    ReadFlash,
    /// [`USBASP_FUNC_ENABLEPROG`]
    EnableProg,
    /// [`USBASP_FUNC_WRITEFLASH`]
    WriteFlash,
    /// [`USBASP_FUNC_READEEPROM`]
    ReadEeprom,
    /// [`USBASP_FUNC_WRITEEEPROM`]
    WriteEeprom,
    /// [`USBASP_FUNC_SETLONGADDRESS`]
    SetLongAddress,
    /// [`USBASP_FUNC_SETISPSCK`]
    SetIspSck,
}

impl Function {
    /// All functions in selector order
    pub const ALL: [Function; 10] = [
        Function::Connect,
        Function::Disconnect,
        Function::Transmit,
        Function::ReadFlash,
        Function::EnableProg,
        Function::WriteFlash,
        Function::ReadEeprom,
        Function::WriteEeprom,
        Function::SetLongAddress,
        Function::SetIspSck,
    ];

    /// Decode a `bRequest` value. Unknown selectors yield `None`.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            USBASP_FUNC_CONNECT => Some(Function::Connect),
            USBASP_FUNC_DISCONNECT => Some(Function::Disconnect),
            USBASP_FUNC_TRANSMIT => Some(Function::Transmit),
            USBASP_FUNC_READFLASH => Some(Function::ReadFlash),
            USBASP_FUNC_ENABLEPROG => Some(Function::EnableProg),
            USBASP_FUNC_WRITEFLASH => Some(Function::WriteFlash),
            USBASP_FUNC_READEEPROM => Some(Function::ReadEeprom),
            USBASP_FUNC_WRITEEEPROM => Some(Function::WriteEeprom),
            USBASP_FUNC_SETLONGADDRESS => Some(Function::SetLongAddress),
            USBASP_FUNC_SETISPSCK => Some(Function::SetIspSck),
            _ => None,
        }
    }

    /// The `bRequest` value of this function
    pub const fn selector(self) -> u8 {
        match self {
            Function::Connect => USBASP_FUNC_CONNECT,
            Function::Disconnect => USBASP_FUNC_DISCONNECT,
            Function::Transmit => USBASP_FUNC_TRANSMIT,
            Function::ReadFlash => USBASP_FUNC_READFLASH,
            Function::EnableProg => USBASP_FUNC_ENABLEPROG,
            Function::WriteFlash => USBASP_FUNC_WRITEFLASH,
            Function::ReadEeprom => USBASP_FUNC_READEEPROM,
            Function::WriteEeprom => USBASP_FUNC_WRITEEEPROM,
            Function::SetLongAddress => USBASP_FUNC_SETLONGADDRESS,
            Function::SetIspSck => USBASP_FUNC_SETISPSCK,
        }
    }

    /// Short lowercase name
    pub const fn name(self) -> &'static str {
        match self {
            Function::Connect => "connect",
            Function::Disconnect => "disconnect",
            Function::Transmit => "transmit",
            Function::ReadFlash => "read-flash",
            Function::EnableProg => "enable-prog",
            Function::WriteFlash => "write-flash",
            Function::ReadEeprom => "read-eeprom",
            Function::WriteEeprom => "write-eeprom",
            Function::SetLongAddress => "set-long-address",
            Function::SetIspSck => "set-isp-sck",
        }
    }
}

/// ISP clock options (value of `SetIspSck`)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SckOption {
    /// Let the driver pick its default speed
    #[default]
    Auto = 0,
    /// 500 Hz
    Hz500 = 1,
    /// 1 kHz
    Khz1 = 2,
    /// 2 kHz
    Khz2 = 3,
    /// 4 kHz
    Khz4 = 4,
    /// 8 kHz, also forced by the slow-SCK jumper
    Khz8 = 5,
    /// 16 kHz
    Khz16 = 6,
    /// 32 kHz
    Khz32 = 7,
    /// 93.75 kHz
    Khz93_75 = 8,
    /// 187.5 kHz
    Khz187_5 = 9,
    /// 375 kHz
    Khz375 = 10,
    /// 750 kHz
    Khz750 = 11,
    /// 1.5 MHz
    Khz1500 = 12,
}

impl SckOption {
    /// Option applied on connect while the slow-SCK jumper is closed
    pub const FORCED_SLOW: SckOption = SckOption::Khz8;

    /// Decode an option byte. Unknown codes fall back to `Auto`.
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => SckOption::Hz500,
            2 => SckOption::Khz1,
            3 => SckOption::Khz2,
            4 => SckOption::Khz4,
            5 => SckOption::Khz8,
            6 => SckOption::Khz16,
            7 => SckOption::Khz32,
            8 => SckOption::Khz93_75,
            9 => SckOption::Khz187_5,
            10 => SckOption::Khz375,
            11 => SckOption::Khz750,
            12 => SckOption::Khz1500,
            _ => SckOption::Auto,
        }
    }

    /// Option byte as sent on the wire
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Nominal SCK frequency. `Auto` reports the 375 kHz default.
    pub fn frequency_hz(self) -> u32 {
        match self {
            SckOption::Auto => 375_000,
            SckOption::Hz500 => 500,
            SckOption::Khz1 => 1_000,
            SckOption::Khz2 => 2_000,
            SckOption::Khz4 => 4_000,
            SckOption::Khz8 => 8_000,
            SckOption::Khz16 => 16_000,
            SckOption::Khz32 => 32_000,
            SckOption::Khz93_75 => 93_750,
            SckOption::Khz187_5 => 187_500,
            SckOption::Khz375 => 375_000,
            SckOption::Khz750 => 750_000,
            SckOption::Khz1500 => 1_500_000,
        }
    }
}

bitflags! {
    /// Block flags of a `WriteFlash` request
    ///
    /// A paged write larger than one control transfer is split into blocks.
    /// The first block arms the page counter, the last one flushes any
    /// partially filled page.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BlockFlags: u8 {
        /// First block of a paged write
        const FIRST = 1 << 0;
        /// Last block of a paged write
        const LAST  = 1 << 1;
    }
}

/// Paging parameters carried in `wIndex` of a `WriteFlash` request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriteParams {
    /// Page size in bytes, 0 for unpaged devices
    pub page_size: u16,
    /// Block flags
    pub flags: BlockFlags,
}

/// Decode the paging parameters of a `WriteFlash` request.
///
/// Bit layout of the two bytes (`wIndex` low, `wIndex` high):
///
/// ```text
/// lo:  7..0  page size bits 7..0
/// hi:  7..4  page size bits 11..8
/// hi:  3..0  block flags (bit 0 FIRST, bit 1 LAST)
/// ```
pub fn decode_write_params(lo: u8, hi: u8) -> WriteParams {
    let page_size = lo as u16 | (((hi & 0xF0) as u16) << 4);
    WriteParams {
        page_size,
        flags: BlockFlags::from_bits_retain(hi & 0x0F),
    }
}

/// Encode paging parameters into the two `wIndex` bytes
pub fn encode_write_params(params: WriteParams) -> (u8, u8) {
    let lo = params.page_size as u8;
    let hi = ((params.page_size >> 4) as u8 & 0xF0) | (params.flags.bits() & 0x0F);
    (lo, hi)
}
