//! Protocol errors

use thiserror::Error;

use crate::settings::Setting;

/// Errors from the serial transport
#[derive(Error, Debug)]
pub enum TransportError {
    /// The port could not be opened
    #[error("Port unavailable: {port}: {reason}")]
    PortUnavailable {
        /// Port name as given
        port: String,
        /// OS-reported cause
        reason: String,
    },

    /// Driver-level failure on an open port
    #[error("Serial port error: {0}")]
    SerialError(String),

    /// Nothing arrived before the response timeout
    #[error("Connection timeout")]
    Timeout,

    /// The close handle was fired
    #[error("Connection closed")]
    Closed,

    /// Operation on a transport that is not open
    #[error("Port not open")]
    NotOpen,

    /// Read or write failed
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Why a byte sequence is not a valid frame
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Malformation {
    /// Fewer bytes than the smallest frame
    #[error("{len} bytes is shorter than the minimum frame")]
    TooShort {
        /// Bytes available
        len: usize,
    },

    /// First byte is not the start marker
    #[error("start marker {0:#04x}")]
    BadStartMarker(u8),

    /// Length byte disagrees with the fixed body length or the input
    #[error("declared length {declared} but {available} bytes follow")]
    LengthMismatch {
        /// Value of the length byte
        declared: usize,
        /// Bytes after the length byte
        available: usize,
    },

    /// Transmitted checksum does not match the computed one
    #[error("checksum mismatch: expected {expected:#06x}, got {actual:#06x}")]
    ChecksumMismatch {
        /// Computed over the received bytes
        expected: u16,
        /// As transmitted
        actual: u16,
    },
}

/// Frame decoding errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Bytes do not form a valid frame
    #[error("Malformed frame: {0}")]
    Malformed(#[from] Malformation),
}

/// A value outside a setting's domain
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unsupported value '{value}' for {setting}")]
pub struct UnsupportedValueError {
    /// Setting the value was offered for
    pub setting: Setting,
    /// The rejected value, as labelled
    pub value: String,
}

impl UnsupportedValueError {
    /// Rejection of `value` for `setting`
    pub fn new(setting: Setting, value: impl Into<String>) -> Self {
        Self {
            setting,
            value: value.into(),
        }
    }
}

/// Errors from [`DeviceSession::connect`](crate::session::DeviceSession::connect)
#[derive(Error, Debug)]
pub enum ConnectError {
    /// The session is already connected
    #[error("Already connected")]
    AlreadyConnected,

    /// No candidate rate got a well-formed answer
    #[error("No device answered on {port} (tried {tried:?})")]
    NoDeviceFound {
        /// Port that was swept
        port: String,
        /// Rates tried, in order
        tried: Vec<u32>,
    },

    /// The close handle was fired while connecting
    #[error("Connection attempt cancelled")]
    Cancelled,

    /// The port could not be opened
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Errors from reading or writing device configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No open connection
    #[error("Not connected to device")]
    NotConnected,

    /// A value in the batch is outside its setting's domain
    #[error(transparent)]
    Unsupported(#[from] UnsupportedValueError),

    /// An exchange with the device failed
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Any error a session operation can return
#[derive(Error, Debug)]
pub enum SessionError {
    /// Connecting failed
    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// Reading or writing settings failed
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The worker thread has exited
    #[error("Session worker stopped")]
    WorkerStopped,
}
