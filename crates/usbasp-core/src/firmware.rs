//! Firmware main loop
//!
//! The USB driver owns the control endpoint and calls back into the
//! programmer through [`UsbFunctions`]. Everything runs from one poll loop;
//! callbacks never nest, so the session is only ever borrowed by one
//! handler at a time.

use crate::dispatch::Programmer;
use crate::driver::{Board, IspDriver};

/// Callbacks the USB driver invokes for vendor requests
///
/// Return values follow the driver's conventions: `0xFF` from `setup`
/// announces a streamed data stage, `0xFF` from `read`/`write` stalls it.
pub trait UsbFunctions {
    /// A setup packet arrived
    fn setup(&mut self, setup: &[u8; 8]) -> u8;

    /// Reply bytes of the last non-streamed setup
    fn reply(&self) -> &[u8];

    /// The host wants the next IN packet
    fn read(&mut self, buf: &mut [u8]) -> u8;

    /// The host sent the next OUT packet
    fn write(&mut self, data: &[u8]) -> u8;
}

/// USB device driver trait
pub trait UsbDevice {
    /// Detach from the bus long enough for the host to notice, then attach
    fn reconnect(&mut self);

    /// Prepare the endpoint state machine
    fn init(&mut self);

    /// Process pending bus events, invoking `functions` as needed
    fn poll<F: UsbFunctions>(&mut self, functions: &mut F);
}

impl<I: IspDriver, B: Board> UsbFunctions for Programmer<I, B> {
    fn setup(&mut self, setup: &[u8; 8]) -> u8 {
        self.usb_function_setup(setup)
    }

    fn reply(&self) -> &[u8] {
        self.session.reply()
    }

    fn read(&mut self, buf: &mut [u8]) -> u8 {
        self.usb_function_read(buf)
    }

    fn write(&mut self, data: &[u8]) -> u8 {
        self.usb_function_write(data)
    }
}

impl<I: IspDriver, B: Board> Programmer<I, B> {
    /// Bring the programmer up
    ///
    /// Forces a USB re-enumeration, lights the idle LED, starts the clock
    /// and initializes the USB driver.
    pub fn init<U: UsbDevice>(&mut self, usb: &mut U) {
        usb.reconnect();
        self.board.set_idle_led(true);
        self.board.init_clock();
        usb.init();
        log::info!("usbasp ready");
    }

    /// Run one iteration of the main loop
    pub fn poll<U: UsbDevice>(&mut self, usb: &mut U) {
        usb.poll(self);
    }

    /// Run the main loop forever
    pub fn run<U: UsbDevice>(&mut self, usb: &mut U) -> ! {
        loop {
            usb.poll(self);
        }
    }
}
