//! # GM60 Core Library
//!
//! Configuration protocol for GM60-class serial barcode scanners.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//!
//! This library provides:
//! - Binary frame codec with checksum validation
//! - Legacy CRLF text command support
//! - Baud rate auto-negotiation
//! - Reading and writing scanner settings (read mode, baud rate, LED mode,
//!   LED brightness, color mode)
//! - A worker thread for driving a session from async code
//!
//! ## Example
//!
//! ```rust,ignore
//! use gm60_core::prelude::*;
//!
//! let mut session = DeviceSession::new(SessionConfig::default());
//! let conn = session.connect("/dev/ttyUSB0")?;
//! println!("connected at {} baud", conn.baud_rate);
//!
//! let mut batch = ConfigBatch::new();
//! batch.insert(Setting::ReadMode, SettingValue::ReadMode(ReadMode::Induction));
//! session.apply_configuration(&batch)?;
//! println!("{}", session.device_state().get(Setting::ReadMode));
//! ```

pub mod protocol;
pub mod session;
pub mod settings;
pub mod worker;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::protocol::{
        ConfigError, ConnectError, ProtocolVariant, SerialTransport, SessionError, Transport,
        TransportError,
    };
    pub use crate::session::{Connection, ConnectionState, DeviceSession, SessionConfig};
    pub use crate::settings::{
        BaudRate, ColorMode, ConfigBatch, DeviceState, LedBrightness, LedMode, ReadMode, Reading,
        Setting, SettingValue,
    };
    pub use crate::worker::{SessionHandle, SessionWorker};
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
