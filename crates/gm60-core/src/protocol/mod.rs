//! Serial Protocol Communication
//!
//! Implements the GM60 scanner's configuration protocol.
//!
//! Supports the checksummed binary frame protocol and the older CRLF text
//! protocol.

pub mod catalog;
mod error;
pub mod frame;
pub mod legacy;
pub mod negotiator;
pub mod serial;
pub mod transport;

pub use catalog::ProtocolVariant;
pub use error::{
    ConfigError, ConnectError, FrameError, Malformation, SessionError, TransportError,
    UnsupportedValueError,
};
pub use frame::Frame;
pub use negotiator::{Negotiated, Negotiator, ProbeAttempt, ProbeOutcome};
pub use serial::{list_ports, port_names, PortInfo, SerialTransport};
pub use transport::{CloseHandle, Transport};

/// Baud rates tried during negotiation, in order.
///
/// The order decides which rate wins when a noisy line answers at more than
/// one, so it must not be re-sorted.
pub const DEFAULT_CANDIDATE_BAUDS: [u32; 8] = [9600, 1200, 4800, 14400, 19200, 38400, 57600, 115200];

/// Default timeout for one probe during negotiation, in milliseconds
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 300;

/// Default timeout for responses in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 1000;
