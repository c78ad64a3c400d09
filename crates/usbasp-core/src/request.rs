//! Setup packet decoding
//!
//! Every USBasp command is a vendor control request. The 8-byte setup
//! packet is laid out as:
//!
//! | Byte | Field           | Used as                                   |
//! |------|-----------------|-------------------------------------------|
//! | 0    | bmRequestType   | ignored                                   |
//! | 1    | bRequest        | function selector                         |
//! | 2..4 | wValue (LE)     | 16-bit address, ISP bytes 0-1, SCK option |
//! | 4..6 | wIndex (LE)     | page size and block flags, ISP bytes 2-3  |
//! | 6..8 | wLength (LE)    | byte count of read/write sessions         |
//!
//! `SetLongAddress` reuses bytes 2..6 as one little-endian 32-bit address.

use crate::protocol::{decode_write_params, encode_write_params, Function, WriteParams};

/// `bmRequestType` for vendor requests to the device, device-to-host
pub const REQUEST_TYPE_VENDOR_IN: u8 = 0xC0;
/// `bmRequestType` for vendor requests to the device, host-to-device
pub const REQUEST_TYPE_VENDOR_OUT: u8 = 0x40;

/// A raw setup packet with typed accessors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControlRequest {
    data: [u8; 8],
}

impl ControlRequest {
    /// Wrap a raw setup packet
    pub const fn from_bytes(data: [u8; 8]) -> Self {
        Self { data }
    }

    /// Raw setup packet bytes
    pub const fn as_bytes(&self) -> &[u8; 8] {
        &self.data
    }

    /// `bmRequestType`
    pub const fn request_type(&self) -> u8 {
        self.data[0]
    }

    /// Raw function selector (`bRequest`)
    pub const fn selector(&self) -> u8 {
        self.data[1]
    }

    /// Decoded function selector, `None` for unknown selectors
    pub fn function(&self) -> Option<Function> {
        Function::from_byte(self.selector())
    }

    /// `wValue`
    pub const fn value(&self) -> u16 {
        u16::from_le_bytes([self.data[2], self.data[3]])
    }

    /// `wIndex`
    pub const fn index(&self) -> u16 {
        u16::from_le_bytes([self.data[4], self.data[5]])
    }

    /// `wLength`, the byte count of a read or write session
    pub const fn length(&self) -> u16 {
        u16::from_le_bytes([self.data[6], self.data[7]])
    }

    /// 16-bit address of read/write requests
    pub const fn short_address(&self) -> u32 {
        self.value() as u32
    }

    /// 32-bit address of a `SetLongAddress` request
    pub const fn long_address(&self) -> u32 {
        u32::from_le_bytes([self.data[2], self.data[3], self.data[4], self.data[5]])
    }

    /// The four raw ISP bytes of a `Transmit` request
    pub fn isp_bytes(&self) -> [u8; 4] {
        [self.data[2], self.data[3], self.data[4], self.data[5]]
    }

    /// Paging parameters of a `WriteFlash` request
    pub fn write_params(&self) -> WriteParams {
        decode_write_params(self.data[4], self.data[5])
    }

    /// SCK option byte of a `SetIspSck` request
    pub const fn sck_code(&self) -> u8 {
        self.data[2]
    }

    /// Build a request from its fields
    pub fn new(request_type: u8, selector: u8, value: u16, index: u16, length: u16) -> Self {
        let v = value.to_le_bytes();
        let i = index.to_le_bytes();
        let l = length.to_le_bytes();
        Self::from_bytes([request_type, selector, v[0], v[1], i[0], i[1], l[0], l[1]])
    }

    /// Build a request without parameters
    pub fn simple(function: Function) -> Self {
        Self::new(REQUEST_TYPE_VENDOR_IN, function.selector(), 0, 0, 4)
    }

    /// Build a `Transmit` request
    pub fn transmit(bytes: [u8; 4]) -> Self {
        Self::new(
            REQUEST_TYPE_VENDOR_IN,
            Function::Transmit.selector(),
            u16::from_le_bytes([bytes[0], bytes[1]]),
            u16::from_le_bytes([bytes[2], bytes[3]]),
            4,
        )
    }

    /// Build a `ReadFlash` request
    pub fn read_flash(address: u16, length: u16) -> Self {
        Self::new(
            REQUEST_TYPE_VENDOR_IN,
            Function::ReadFlash.selector(),
            address,
            0,
            length,
        )
    }

    /// Build a `ReadEeprom` request
    pub fn read_eeprom(address: u16, length: u16) -> Self {
        Self::new(
            REQUEST_TYPE_VENDOR_IN,
            Function::ReadEeprom.selector(),
            address,
            0,
            length,
        )
    }

    /// Build a `WriteFlash` request
    pub fn write_flash(address: u16, params: WriteParams, length: u16) -> Self {
        let (lo, hi) = encode_write_params(params);
        Self::new(
            REQUEST_TYPE_VENDOR_OUT,
            Function::WriteFlash.selector(),
            address,
            u16::from_le_bytes([lo, hi]),
            length,
        )
    }

    /// Build a `WriteEeprom` request
    pub fn write_eeprom(address: u16, length: u16) -> Self {
        Self::new(
            REQUEST_TYPE_VENDOR_OUT,
            Function::WriteEeprom.selector(),
            address,
            0,
            length,
        )
    }

    /// Build a `SetLongAddress` request
    pub fn set_long_address(address: u32) -> Self {
        let a = address.to_le_bytes();
        Self::from_bytes([
            REQUEST_TYPE_VENDOR_IN,
            Function::SetLongAddress.selector(),
            a[0],
            a[1],
            a[2],
            a[3],
            4,
            0,
        ])
    }

    /// Build a `SetIspSck` request
    pub fn set_isp_sck(code: u8) -> Self {
        Self::new(
            REQUEST_TYPE_VENDOR_IN,
            Function::SetIspSck.selector(),
            code as u16,
            0,
            4,
        )
    }

    /// Whether the data stage flows from device to host
    pub const fn is_in(&self) -> bool {
        self.data[0] & 0x80 != 0
    }
}

impl From<[u8; 8]> for ControlRequest {
    fn from(data: [u8; 8]) -> Self {
        Self::from_bytes(data)
    }
}
