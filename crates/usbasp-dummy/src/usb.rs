//! USB loopback
//!
//! Plays the role of the low-speed USB driver and the host at once:
//! control transfers are handed to the programmer's callbacks packet by
//! packet, following the same rules as the firmware's USB driver:
//!
//! - IN data stages are requested in packets of `min(8, bytes left)` until
//!   the device returns a short packet or `wLength` bytes arrived
//! - OUT data stages are delivered in packets of up to 8 bytes until the
//!   device reports that it expects no more data
//! - `0xFF` from a data callback stalls the transfer

use std::collections::VecDeque;

use thiserror::Error;
use usbasp_core::firmware::{UsbDevice, UsbFunctions};
use usbasp_core::protocol::{MAX_PACKET_SIZE, STREAM_SENTINEL};
use usbasp_core::request::ControlRequest;

/// Transfer failures seen by the host
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransferError {
    /// The device stalled the data stage
    #[error("transfer stalled after {0} bytes")]
    Stall(usize),
}

/// A control transfer queued for the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transfer {
    /// Device-to-host transfer
    In(ControlRequest),
    /// Host-to-device transfer with its data stage
    Out(ControlRequest, Vec<u8>),
}

impl Transfer {
    /// The setup packet of this transfer
    pub fn request(&self) -> &ControlRequest {
        match self {
            Self::In(req) | Self::Out(req, _) => req,
        }
    }
}

/// A finished transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completed {
    /// What was sent
    pub transfer: Transfer,
    /// Data received for IN transfers, empty for OUT transfers
    pub result: Result<Vec<u8>, TransferError>,
}

/// Loopback USB device
#[derive(Debug, Default)]
pub struct LoopbackUsb {
    attached: bool,
    initialized: bool,
    pending: VecDeque<Transfer>,
    completed: Vec<Completed>,
}

impl LoopbackUsb {
    /// Create a detached loopback with an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the device went through a reconnect
    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Whether the driver was initialized
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Queue a transfer for the next poll
    pub fn submit(&mut self, transfer: Transfer) {
        self.pending.push_back(transfer);
    }

    /// Number of queued transfers
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Take all transfers finished so far
    pub fn take_completed(&mut self) -> Vec<Completed> {
        core::mem::take(&mut self.completed)
    }

    /// Run a device-to-host control transfer
    pub fn control_in<F: UsbFunctions>(
        &self,
        functions: &mut F,
        req: &ControlRequest,
    ) -> Result<Vec<u8>, TransferError> {
        let len = functions.setup(req.as_bytes());
        let wanted = req.length() as usize;

        if len != STREAM_SENTINEL {
            let reply = functions.reply();
            let n = (len as usize).min(wanted).min(reply.len());
            return Ok(reply[..n].to_vec());
        }

        let mut data = Vec::with_capacity(wanted);
        let mut packet = [0u8; MAX_PACKET_SIZE];
        while data.len() < wanted {
            let ask = (wanted - data.len()).min(MAX_PACKET_SIZE);
            let n = functions.read(&mut packet[..ask]);
            if n == STREAM_SENTINEL {
                log::debug!("loopback: IN stalled after {} bytes", data.len());
                return Err(TransferError::Stall(data.len()));
            }
            data.extend_from_slice(&packet[..n as usize]);
            if (n as usize) < MAX_PACKET_SIZE {
                break;
            }
        }

        Ok(data)
    }

    /// Run a host-to-device control transfer
    ///
    /// Returns the number of data bytes the device accepted.
    pub fn control_out<F: UsbFunctions>(
        &self,
        functions: &mut F,
        req: &ControlRequest,
        data: &[u8],
    ) -> Result<usize, TransferError> {
        if functions.setup(req.as_bytes()) != STREAM_SENTINEL {
            return Ok(0);
        }

        let mut accepted = 0;
        for packet in data.chunks(MAX_PACKET_SIZE) {
            match functions.write(packet) {
                STREAM_SENTINEL => {
                    log::debug!("loopback: OUT stalled after {} bytes", accepted);
                    return Err(TransferError::Stall(accepted));
                }
                1 => {
                    accepted += packet.len();
                    break;
                }
                _ => accepted += packet.len(),
            }
        }

        Ok(accepted)
    }
}

impl UsbDevice for LoopbackUsb {
    fn reconnect(&mut self) {
        self.attached = true;
    }

    fn init(&mut self) {
        self.initialized = true;
    }

    fn poll<F: UsbFunctions>(&mut self, functions: &mut F) {
        let Some(transfer) = self.pending.pop_front() else {
            return;
        };

        let result = match &transfer {
            Transfer::In(req) => self.control_in(functions, req),
            Transfer::Out(req, data) => self
                .control_out(functions, req, data)
                .map(|_| Vec::new()),
        };
        self.completed.push(Completed { transfer, result });
    }
}
