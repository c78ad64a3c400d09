//! Command dispatcher
//!
//! [`Programmer`] owns the session together with the ISP driver and the
//! board. Control requests go through [`Programmer::handle_control`], data
//! packets through the streaming handlers in [`crate::stream`].

use crate::driver::{Board, IspDriver};
use crate::protocol::{Function, SckOption, SCK_STATUS_OK, STREAM_SENTINEL};
use crate::request::ControlRequest;
use crate::session::{Memory, Session};

/// Outcome of a control request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    /// Send this many bytes of the reply buffer
    Data(u8),
    /// A device-to-host data stage follows through the read handler
    StreamIn,
    /// A host-to-device data stage follows through the write handler
    StreamOut,
}

impl Reply {
    /// Reply length as returned to the USB driver
    pub const fn wire_len(self) -> u8 {
        match self {
            Self::Data(len) => len,
            Self::StreamIn | Self::StreamOut => STREAM_SENTINEL,
        }
    }

    /// Whether a streamed data stage follows
    pub const fn is_stream(self) -> bool {
        matches!(self, Self::StreamIn | Self::StreamOut)
    }
}

/// The USBasp command core
pub struct Programmer<I, B> {
    pub(crate) isp: I,
    pub(crate) board: B,
    pub(crate) session: Session,
}

impl<I: IspDriver, B: Board> Programmer<I, B> {
    /// Create a programmer with an idle session
    pub fn new(isp: I, board: B) -> Self {
        Self {
            isp,
            board,
            session: Session::new(),
        }
    }

    /// The shared session
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// The ISP driver
    pub fn isp(&self) -> &I {
        &self.isp
    }

    /// The ISP driver, mutably
    pub fn isp_mut(&mut self) -> &mut I {
        &mut self.isp
    }

    /// The board
    pub fn board(&self) -> &B {
        &self.board
    }

    /// The board, mutably
    pub fn board_mut(&mut self) -> &mut B {
        &mut self.board
    }

    /// Give back the driver and the board
    pub fn into_parts(self) -> (I, B) {
        (self.isp, self.board)
    }

    /// Handle one control request
    ///
    /// Unknown selectors are ignored and answered with an empty reply.
    pub fn handle_control(&mut self, req: &ControlRequest) -> Reply {
        let Some(function) = req.function() else {
            log::trace!("Ignoring unknown function 0x{:02X}", req.selector());
            self.session.set_reply(&[]);
            return Reply::Data(0);
        };

        match function {
            Function::Connect => {
                let option = if self.board.slow_sck_forced() {
                    log::debug!("Connect: slow SCK jumper set");
                    SckOption::FORCED_SLOW
                } else {
                    self.session.sck
                };
                self.isp.set_sck_option(option);
                self.session.long_address = false;

                self.board.set_active_led(true);
                self.isp.connect();
                log::debug!("Connect: SCK {} Hz", option.frequency_hz());
                self.empty_reply()
            }

            Function::Disconnect => {
                self.isp.disconnect();
                self.board.set_active_led(false);
                log::debug!("Disconnect");
                self.empty_reply()
            }

            Function::Transmit => {
                let mut answer = [0u8; 4];
                for (out, byte) in answer.iter_mut().zip(req.isp_bytes()) {
                    *out = self.isp.transmit(byte);
                }
                log::trace!("Transmit: {:02X?} -> {:02X?}", req.isp_bytes(), answer);
                self.session.set_reply(&answer);
                Reply::Data(4)
            }

            Function::EnableProg => {
                let status = self.isp.enter_programming_mode();
                log::debug!("Enable programming: status {}", status);
                self.session.set_reply(&[status]);
                Reply::Data(1)
            }

            Function::ReadFlash | Function::ReadEeprom => {
                let memory = if function == Function::ReadFlash {
                    Memory::Flash
                } else {
                    Memory::Eeprom
                };
                self.session.load_short_address(req.short_address());
                self.session.open_read(memory, req.length());
                log::debug!(
                    "{}: {} bytes at 0x{:08X}",
                    function.name(),
                    req.length(),
                    self.session.address
                );
                Reply::StreamIn
            }

            Function::WriteFlash => {
                let params = req.write_params();
                self.session.load_short_address(req.short_address());
                self.session.open_flash_write(params, req.length());
                log::debug!(
                    "write-flash: {} bytes at 0x{:08X}, page size {}, flags {:?}",
                    req.length(),
                    self.session.address,
                    params.page_size,
                    params.flags
                );
                Reply::StreamOut
            }

            Function::WriteEeprom => {
                self.session.load_short_address(req.short_address());
                self.session.open_eeprom_write(req.length());
                log::debug!(
                    "write-eeprom: {} bytes at 0x{:08X}",
                    req.length(),
                    self.session.address
                );
                Reply::StreamOut
            }

            Function::SetLongAddress => {
                self.session.set_long_address(req.long_address());
                log::debug!("Long address mode: 0x{:08X}", req.long_address());
                self.empty_reply()
            }

            Function::SetIspSck => {
                self.session.sck = SckOption::from_code(req.sck_code());
                log::debug!("SCK option {:?}", self.session.sck);
                self.session.set_reply(&[SCK_STATUS_OK]);
                Reply::Data(1)
            }
        }
    }

    /// Wire-level setup callback
    ///
    /// Returns the number of reply bytes placed in the reply buffer, or
    /// [`STREAM_SENTINEL`] when the data stage is streamed.
    pub fn usb_function_setup(&mut self, setup: &[u8; 8]) -> u8 {
        self.handle_control(&ControlRequest::from_bytes(*setup))
            .wire_len()
    }

    /// Bytes to send back for the last short reply
    pub fn reply(&self) -> &[u8] {
        self.session.reply()
    }

    fn empty_reply(&mut self) -> Reply {
        self.session.set_reply(&[]);
        Reply::Data(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{Call, MockBoard, MockIsp};
    use crate::protocol::{BlockFlags, WriteParams};
    use crate::session::ProgState;

    fn programmer() -> Programmer<MockIsp, MockBoard> {
        Programmer::new(MockIsp::default(), MockBoard::default())
    }

    #[test]
    fn test_connect_applies_stored_sck() {
        let mut prog = programmer();
        assert_eq!(
            prog.handle_control(&ControlRequest::set_isp_sck(10)),
            Reply::Data(1)
        );
        assert_eq!(prog.reply(), &[0]);

        assert_eq!(
            prog.handle_control(&ControlRequest::simple(Function::Connect)),
            Reply::Data(0)
        );
        assert_eq!(
            prog.isp().calls,
            [Call::SetSck(SckOption::Khz375), Call::Connect]
        );
        assert!(prog.board().active_led);
    }

    #[test]
    fn test_connect_with_slow_jumper() {
        let mut prog = programmer();
        prog.board_mut().slow_jumper = true;
        prog.handle_control(&ControlRequest::set_isp_sck(12));
        prog.handle_control(&ControlRequest::simple(Function::Connect));
        assert_eq!(
            prog.isp().calls,
            [Call::SetSck(SckOption::Khz8), Call::Connect]
        );
        // The stored option survives for later connects
        assert_eq!(prog.session().sck_option(), SckOption::Khz1500);
    }

    #[test]
    fn test_disconnect_clears_led() {
        let mut prog = programmer();
        prog.handle_control(&ControlRequest::simple(Function::Connect));
        prog.handle_control(&ControlRequest::simple(Function::Disconnect));
        assert!(!prog.board().active_led);
        assert_eq!(prog.isp().calls.last(), Some(&Call::Disconnect));
    }

    #[test]
    fn test_transmit_passes_bytes_through() {
        let mut prog = programmer();
        let reply = prog.handle_control(&ControlRequest::transmit([0x30, 0x00, 0x01, 0x00]));
        assert_eq!(reply, Reply::Data(4));
        // MockIsp answers with the complement of each byte
        assert_eq!(prog.reply(), &[0xCF, 0xFF, 0xFE, 0xFF]);
        assert_eq!(prog.session().state(), ProgState::Idle);
    }

    #[test]
    fn test_enable_prog_status() {
        let mut prog = programmer();
        prog.isp_mut().enable_status = 1;
        let reply = prog.handle_control(&ControlRequest::simple(Function::EnableProg));
        assert_eq!(reply, Reply::Data(1));
        assert_eq!(prog.reply(), &[1]);
    }

    #[test]
    fn test_read_flash_opens_session() {
        let mut prog = programmer();
        let reply = prog.handle_control(&ControlRequest::read_flash(0x0100, 260));
        assert_eq!(reply, Reply::StreamIn);
        assert_eq!(reply.wire_len(), STREAM_SENTINEL);
        assert_eq!(prog.session().state(), ProgState::ReadingFlash);
        assert_eq!(prog.session().address(), 0x0100);
        assert_eq!(prog.session().remaining(), 260);

        prog.handle_control(&ControlRequest::read_eeprom(0x0010, 4));
        assert_eq!(prog.session().state(), ProgState::ReadingEeprom);
        assert_eq!(prog.session().address(), 0x0010);
    }

    #[test]
    fn test_write_flash_decodes_paging() {
        let mut prog = programmer();
        let params = WriteParams {
            page_size: 256,
            flags: BlockFlags::FIRST,
        };
        let reply = prog.handle_control(&ControlRequest::write_flash(0x0200, params, 512));
        assert_eq!(reply, Reply::StreamOut);
        let session = prog.session();
        assert_eq!(session.state(), ProgState::WritingFlash);
        assert_eq!(session.page_size(), 256);
        assert_eq!(session.page_counter(), 256);
        assert_eq!(session.block_flags(), BlockFlags::FIRST);
        assert_eq!(session.remaining(), 512);
    }

    #[test]
    fn test_long_address_overrides_short_field() {
        let mut prog = programmer();
        prog.handle_control(&ControlRequest::set_long_address(0x0001_2345));
        prog.handle_control(&ControlRequest::read_flash(0x0042, 16));
        assert_eq!(prog.session().address(), 0x0001_2345);

        // Connect falls back to 16-bit addresses
        prog.handle_control(&ControlRequest::simple(Function::Connect));
        prog.handle_control(&ControlRequest::read_flash(0x0042, 16));
        assert_eq!(prog.session().address(), 0x0042);
    }

    #[test]
    fn test_unknown_selector_is_ignored() {
        let mut prog = programmer();
        prog.handle_control(&ControlRequest::write_eeprom(0x20, 3));
        let reply = prog.usb_function_setup(&[0xC0, 0x7F, 1, 2, 3, 4, 5, 6]);
        assert_eq!(reply, 0);
        assert_eq!(prog.session().state(), ProgState::WritingEeprom);
        assert_eq!(prog.session().address(), 0x20);
        assert!(prog.isp().calls.is_empty());
    }
}
