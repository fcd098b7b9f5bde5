//! Transport abstraction
//!
//! The protocol layers talk to the device through [`Transport`] so the
//! session can run against a real serial port or a scripted test double.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::TransportError;

/// Byte channel to the device.
///
/// A transport is a single handle that can be opened, closed and reopened
/// at another baud rate. Reads are bounded by a timeout and never block
/// indefinitely.
pub trait Transport: Send {
    /// Open `port_name` at `baud_rate`. Any previously open port is closed first.
    fn open(&mut self, port_name: &str, baud_rate: u32, timeout: Duration) -> Result<(), TransportError>;

    /// Write all bytes
    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Read at most `n` bytes, returning whatever arrived within `timeout`.
    ///
    /// An empty result means nothing arrived. Fails with
    /// [`TransportError::Closed`] if the close handle fires mid-read.
    fn read_upto(&mut self, n: usize, timeout: Duration) -> Result<Vec<u8>, TransportError>;

    /// Close the port. Safe to call on a closed or never-opened transport.
    fn close(&mut self);

    /// Whether the port is open and no close has been requested
    fn is_open(&self) -> bool;

    /// Discard stale input
    fn clear_input(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    /// Handle that closes this transport from another thread
    fn close_handle(&self) -> CloseHandle;
}

/// Cross-thread close request for a [`Transport`].
///
/// Firing it makes an in-progress or later read fail with
/// [`TransportError::Closed`] until the transport is reopened.
#[derive(Debug, Clone, Default)]
pub struct CloseHandle {
    closed: Arc<AtomicBool>,
}

impl CloseHandle {
    /// A handle in the open state
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the transport to close
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Whether a close has been requested since the last reset
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Clear a previous close request (on reopen)
    pub fn reset(&self) {
        self.closed.store(false, Ordering::SeqCst);
    }
}

/// Time to clock `len` bytes out at `baud_rate` with 8N1 framing
pub fn transmit_time(len: usize, baud_rate: u32) -> Duration {
    // 10 bits per byte: start + 8 data + stop
    let bits = (len as u64) * 10;
    let baud = u64::from(baud_rate.max(1));
    Duration::from_micros(bits * 1_000_000 / baud)
}
