//! Streaming read and write handlers
//!
//! After `ReadFlash`/`ReadEeprom` the USB driver pulls the data stage in
//! packets of at most [`MAX_PACKET_SIZE`] bytes through
//! [`Programmer::read_chunk`]. After `WriteFlash`/`WriteEeprom` it pushes
//! the data stage through [`Programmer::write_chunk`] until that reports
//! completion.

use crate::dispatch::Programmer;
use crate::driver::{Board, IspDriver};
use crate::error::{Error, Result};
use crate::protocol::{BlockFlags, MAX_PACKET_SIZE, STREAM_SENTINEL};
use crate::session::ProgState;

impl<I: IspDriver, B: Board> Programmer<I, B> {
    /// Fill `buf` with the next bytes of the open read session
    ///
    /// Every byte of `buf` is read from the target and the address advances
    /// by `buf.len()`. A packet shorter than [`MAX_PACKET_SIZE`] is the last
    /// one of the transfer and closes the session.
    pub fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize> {
        let state = self.session.state;
        if !state.is_reading() {
            log::warn!("Read packet requested while {}", state);
            return Err(Error::NoReadSession(state));
        }

        for byte in buf.iter_mut() {
            let address = self.session.address;
            *byte = match state {
                ProgState::ReadingFlash => self.isp.read_flash(address),
                _ => self.isp.read_eeprom(address),
            };
            self.session.address = address.wrapping_add(1);
        }
        self.session.remaining = self.session.remaining.saturating_sub(buf.len() as u16);

        log::trace!(
            "read: {} bytes, next address 0x{:08X}",
            buf.len(),
            self.session.address
        );

        if buf.len() < MAX_PACKET_SIZE {
            self.session.close();
        }

        Ok(buf.len())
    }

    /// Consume the next packet of the open write session
    ///
    /// Returns `true` on the packet that completes the session. Bytes
    /// following the last expected one in the same packet are dropped.
    pub fn write_chunk(&mut self, data: &[u8]) -> Result<bool> {
        let state = self.session.state;
        if !state.is_writing() {
            log::warn!("Write packet delivered while {}", state);
            return Err(Error::NoWriteSession(state));
        }

        for (i, &byte) in data.iter().enumerate() {
            let address = self.session.address;

            if state == ProgState::WritingFlash {
                self.write_flash_byte(address, byte);
            } else {
                self.isp.write_eeprom(address, byte);
            }

            self.session.remaining = self.session.remaining.wrapping_sub(1);
            self.session.address = address.wrapping_add(1);

            if self.session.remaining == 0 {
                self.finish_write(address, byte);
                if i + 1 < data.len() {
                    log::warn!("write: dropping {} bytes past the end", data.len() - i - 1);
                }
                return Ok(true);
            }
        }

        log::trace!(
            "write: {} bytes, {} remaining",
            data.len(),
            self.session.remaining
        );

        Ok(false)
    }

    /// Wire-level read callback
    ///
    /// Returns the number of bytes placed in `buf`, or [`STREAM_SENTINEL`]
    /// to make the USB driver stall the transfer. Buffers larger than a
    /// packet are truncated to [`MAX_PACKET_SIZE`].
    pub fn usb_function_read(&mut self, buf: &mut [u8]) -> u8 {
        let len = buf.len().min(MAX_PACKET_SIZE);
        match self.read_chunk(&mut buf[..len]) {
            Ok(n) => n as u8,
            Err(_) => STREAM_SENTINEL,
        }
    }

    /// Wire-level write callback
    ///
    /// Returns 1 when no more data is expected, 0 when more packets are
    /// expected and [`STREAM_SENTINEL`] to stall the transfer.
    pub fn usb_function_write(&mut self, data: &[u8]) -> u8 {
        match self.write_chunk(data) {
            Ok(true) => 1,
            Ok(false) => 0,
            Err(_) => STREAM_SENTINEL,
        }
    }

    fn write_flash_byte(&mut self, address: u32, byte: u8) {
        let page_size = self.session.page_size;
        if page_size == 0 {
            self.isp.write_flash(address, byte, true);
            return;
        }

        if self.session.page_counter == 0 {
            // No FIRST block was seen for this page size
            self.session.page_counter = page_size;
        }

        self.isp.write_flash(address, byte, false);
        self.session.page_counter -= 1;
        if self.session.page_counter == 0 {
            log::trace!("write: flushing page at 0x{:08X}", address);
            self.isp.flush_page(address, byte);
            self.session.page_counter = page_size;
        }
    }

    fn finish_write(&mut self, address: u32, byte: u8) {
        let session = &mut self.session;
        let partial_page = session.page_size != 0 && session.page_counter != session.page_size;

        if session.state == ProgState::WritingFlash
            && session.block_flags.contains(BlockFlags::LAST)
            && partial_page
        {
            log::trace!("write: flushing partial page at 0x{:08X}", address);
            self.isp.flush_page(address, byte);
            session.page_counter = session.page_size;
        }

        session.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{Call, MockBoard, MockIsp};
    use crate::protocol::{Function, WriteParams};
    use crate::request::ControlRequest;
    use std::vec::Vec;

    fn programmer() -> Programmer<MockIsp, MockBoard> {
        Programmer::new(MockIsp::default(), MockBoard::default())
    }

    fn flushes(prog: &Programmer<MockIsp, MockBoard>) -> Vec<u32> {
        prog.isp()
            .calls
            .iter()
            .filter_map(|call| match call {
                Call::Flush(addr, _) => Some(*addr),
                _ => None,
            })
            .collect()
    }

    fn paged(page_size: u16, flags: BlockFlags) -> WriteParams {
        WriteParams { page_size, flags }
    }

    #[test]
    fn test_read_requires_session() {
        let mut prog = programmer();
        let mut buf = [0u8; 8];
        assert_eq!(
            prog.read_chunk(&mut buf),
            Err(Error::NoReadSession(ProgState::Idle))
        );
        assert_eq!(prog.usb_function_read(&mut buf), STREAM_SENTINEL);

        prog.handle_control(&ControlRequest::write_eeprom(0, 4));
        assert_eq!(
            prog.read_chunk(&mut buf),
            Err(Error::NoReadSession(ProgState::WritingEeprom))
        );
    }

    #[test]
    fn test_read_flash_260_bytes() {
        let mut prog = programmer();
        prog.handle_control(&ControlRequest::read_flash(0x0000, 260));

        let mut data = Vec::new();
        let mut chunks = Vec::new();
        let mut remaining = 260usize;
        loop {
            let mut buf = [0u8; MAX_PACKET_SIZE];
            let len = remaining.min(MAX_PACKET_SIZE);
            let n = prog.read_chunk(&mut buf[..len]).unwrap();
            data.extend_from_slice(&buf[..n]);
            chunks.push(n);
            remaining -= n;
            if n < MAX_PACKET_SIZE {
                break;
            }
        }

        assert_eq!(chunks.len(), 33);
        assert!(chunks[..32].iter().all(|&n| n == 8));
        assert_eq!(chunks[32], 4);
        assert_eq!(prog.session().state(), ProgState::Idle);
        assert_eq!(prog.session().address(), 260);
        // MockIsp returns the low address byte as flash content
        assert!(data.iter().enumerate().all(|(i, &b)| b == i as u8));

        let mut buf = [0u8; 8];
        assert_eq!(prog.usb_function_read(&mut buf), STREAM_SENTINEL);
        assert_eq!(prog.usb_function_write(&buf), STREAM_SENTINEL);
    }

    #[test]
    fn test_read_eeprom_uses_eeprom() {
        let mut prog = programmer();
        prog.handle_control(&ControlRequest::read_eeprom(0x0010, 2));
        let mut buf = [0u8; 2];
        assert_eq!(prog.usb_function_read(&mut buf), 2);
        assert_eq!(
            prog.isp().calls,
            [Call::ReadEeprom(0x10), Call::ReadEeprom(0x11)]
        );
        assert_eq!(prog.session().state(), ProgState::Idle);
    }

    #[test]
    fn test_full_packet_keeps_read_open() {
        let mut prog = programmer();
        prog.handle_control(&ControlRequest::read_flash(0x0000, 16));
        let mut buf = [0u8; 8];
        prog.read_chunk(&mut buf).unwrap();
        prog.read_chunk(&mut buf).unwrap();
        assert_eq!(prog.session().state(), ProgState::ReadingFlash);
        assert_eq!(prog.session().remaining(), 0);
    }

    #[test]
    fn test_write_requires_session() {
        let mut prog = programmer();
        assert_eq!(
            prog.write_chunk(&[1, 2, 3]),
            Err(Error::NoWriteSession(ProgState::Idle))
        );
        prog.handle_control(&ControlRequest::read_flash(0, 8));
        assert_eq!(prog.usb_function_write(&[1]), STREAM_SENTINEL);
        assert!(prog.isp().calls.is_empty());
    }

    #[test]
    fn test_unpaged_flash_commits_every_byte() {
        let mut prog = programmer();
        let req = ControlRequest::write_flash(0x0040, paged(0, BlockFlags::FIRST | BlockFlags::LAST), 5);
        prog.handle_control(&req);

        assert_eq!(prog.write_chunk(&[1, 2, 3]), Ok(false));
        assert_eq!(prog.write_chunk(&[4, 5]), Ok(true));

        assert_eq!(
            prog.isp().calls,
            [
                Call::WriteFlash(0x40, 1, true),
                Call::WriteFlash(0x41, 2, true),
                Call::WriteFlash(0x42, 3, true),
                Call::WriteFlash(0x43, 4, true),
                Call::WriteFlash(0x44, 5, true),
            ]
        );
        assert!(flushes(&prog).is_empty());
        assert_eq!(prog.session().state(), ProgState::Idle);
    }

    #[test]
    fn test_paged_flash_two_pages() {
        let mut prog = programmer();
        let req = ControlRequest::write_flash(0x0010, paged(64, BlockFlags::FIRST), 128);
        prog.handle_control(&req);

        let chunk = [0xA5u8; 64];
        assert_eq!(prog.write_chunk(&chunk), Ok(false));
        assert_eq!(prog.session().page_counter(), 64);
        assert_eq!(prog.write_chunk(&chunk), Ok(true));

        assert_eq!(flushes(&prog), [0x0010 + 63, 0x0010 + 127]);
        assert_eq!(prog.session().address(), 0x0010 + 128);
        assert!(prog
            .isp()
            .calls
            .iter()
            .all(|call| !matches!(call, Call::WriteFlash(_, _, true))));
    }

    #[test]
    fn test_page_counter_cycles() {
        let mut prog = programmer();
        prog.handle_control(&ControlRequest::write_flash(0, paged(4, BlockFlags::FIRST), 12));

        let mut counters = Vec::new();
        for byte in 0..12u8 {
            prog.write_chunk(&[byte]).unwrap();
            counters.push(prog.session().page_counter());
        }
        assert_eq!(counters, [3, 2, 1, 4, 3, 2, 1, 4, 3, 2, 1, 4]);
        assert_eq!(flushes(&prog), [3, 7, 11]);
    }

    #[test]
    fn test_last_block_flushes_partial_page() {
        let mut prog = programmer();
        let flags = BlockFlags::FIRST | BlockFlags::LAST;
        prog.handle_control(&ControlRequest::write_flash(0x100, paged(32, flags), 40));

        for chunk in [[0u8; 8]; 5] {
            prog.write_chunk(&chunk).unwrap();
        }

        // One flush at the page boundary, one for the 8 pending bytes
        assert_eq!(flushes(&prog), [0x100 + 31, 0x100 + 39]);
        assert_eq!(prog.session().state(), ProgState::Idle);
    }

    #[test]
    fn test_last_block_on_page_boundary() {
        let mut prog = programmer();
        let flags = BlockFlags::FIRST | BlockFlags::LAST;
        prog.handle_control(&ControlRequest::write_flash(0, paged(16, flags), 32));

        for chunk in [[0u8; 8]; 4] {
            prog.write_chunk(&chunk).unwrap();
        }
        assert_eq!(flushes(&prog), [15, 31]);
    }

    #[test]
    fn test_partial_page_without_last_flag() {
        let mut prog = programmer();
        prog.handle_control(&ControlRequest::write_flash(0, paged(16, BlockFlags::FIRST), 8));
        assert_eq!(prog.write_chunk(&[0u8; 8]), Ok(true));
        assert!(flushes(&prog).is_empty());
        assert_eq!(prog.session().page_counter(), 8);

        // The next block continues the same page
        prog.handle_control(&ControlRequest::write_flash(8, paged(16, BlockFlags::LAST), 8));
        assert_eq!(prog.write_chunk(&[0u8; 8]), Ok(true));
        assert_eq!(flushes(&prog), [15]);
    }

    #[test]
    fn test_eeprom_never_flushes() {
        let mut prog = programmer();
        prog.handle_control(&ControlRequest::write_eeprom(0x0020, 20));
        let mut done = Vec::new();
        for chunk in [[7u8; 8], [7u8; 8]] {
            done.push(prog.usb_function_write(&chunk));
        }
        done.push(prog.usb_function_write(&[7u8; 4]));

        assert_eq!(done, [0, 0, 1]);
        assert!(flushes(&prog).is_empty());
        assert_eq!(
            prog.isp()
                .calls
                .iter()
                .filter(|call| matches!(call, Call::WriteEeprom(_, 7)))
                .count(),
            20
        );
        assert_eq!(prog.session().address(), 0x0020 + 20);
    }

    #[test]
    fn test_trailing_bytes_are_dropped() {
        let mut prog = programmer();
        prog.handle_control(&ControlRequest::write_eeprom(0, 3));
        assert_eq!(prog.write_chunk(&[1, 2, 3, 4, 5]), Ok(true));
        assert_eq!(prog.isp().calls.len(), 3);
        assert_eq!(prog.session().address(), 3);
    }

    #[test]
    fn test_address_advances_for_any_chunking() {
        for sizes in [&[8usize, 8, 8, 6][..], &[1, 7, 3, 5, 8, 6][..], &[30][..]] {
            let mut prog = programmer();
            prog.handle_control(&ControlRequest::write_flash(0x0300, paged(0, BlockFlags::empty()), 30));
            let mut done = false;
            for &size in sizes {
                done = prog.write_chunk(&[0u8; 30][..size]).unwrap();
            }
            assert!(done);
            assert_eq!(prog.session().address(), 0x0300 + 30);
        }
    }

    #[test]
    fn test_long_address_read_session() {
        let mut prog = programmer();
        prog.handle_control(&ControlRequest::set_long_address(0x0001_0000));
        prog.handle_control(&ControlRequest::read_flash(0x1234, 2));
        let mut buf = [0u8; 2];
        prog.read_chunk(&mut buf).unwrap();
        assert_eq!(
            prog.isp().calls,
            [Call::ReadFlash(0x0001_0000), Call::ReadFlash(0x0001_0001)]
        );

        // Address keeps counting from where the last session stopped
        prog.handle_control(&ControlRequest::simple(Function::Disconnect));
        prog.handle_control(&ControlRequest::read_flash(0x1234, 1));
        assert_eq!(prog.session().address(), 0x0001_0002);
    }
}
