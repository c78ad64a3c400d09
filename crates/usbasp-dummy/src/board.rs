//! Dummy programmer board

use usbasp_core::driver::Board;

/// Board with two LEDs, the slow-SCK jumper and a clock flag
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DummyBoard {
    /// Red LED state
    pub active_led: bool,
    /// Green LED state
    pub idle_led: bool,
    /// Jumper closed, forcing 8 kHz SCK on connect
    pub slow_sck_jumper: bool,
    /// Whether `init_clock` ran
    pub clock_running: bool,
}

impl DummyBoard {
    /// Create a board with the jumper in the given position
    pub fn new(slow_sck_jumper: bool) -> Self {
        Self {
            slow_sck_jumper,
            ..Self::default()
        }
    }
}

impl Board for DummyBoard {
    fn set_active_led(&mut self, on: bool) {
        self.active_led = on;
    }

    fn set_idle_led(&mut self, on: bool) {
        self.idle_led = on;
    }

    fn slow_sck_forced(&self) -> bool {
        self.slow_sck_jumper
    }

    fn init_clock(&mut self) {
        self.clock_running = true;
    }
}
