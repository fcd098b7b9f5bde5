//! Device session
//!
//! Owns the connection to one scanner and exposes the operations the
//! configuration panel needs: connect, read the current settings, apply a
//! batch of settings, disconnect.
//!
//! Exchanges are strictly half-duplex: every write is followed by a bounded
//! read before the next write. The device has no request IDs, so this is
//! what keeps answers matched to questions.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::protocol::{
    port_names, CloseHandle, ConfigError, ConnectError, Negotiator, ProbeAttempt, ProtocolVariant,
    SerialTransport, Transport, TransportError, DEFAULT_CANDIDATE_BAUDS, DEFAULT_PROBE_TIMEOUT_MS,
    DEFAULT_TIMEOUT_MS,
};
use crate::settings::{ConfigBatch, DeviceState, Setting, SettingValue};

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// Not connected
    Disconnected,
    /// Baud rate sweep in progress
    Negotiating,
    /// Connected and ready
    Connected,
    /// Last connect attempt failed
    Error,
}

/// Session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Command vocabulary the device speaks
    pub variant: ProtocolVariant,
    /// Rates tried when connecting, in order
    pub candidate_bauds: Vec<u32>,
    /// Per-probe timeout during negotiation, in milliseconds
    pub probe_timeout_ms: u64,
    /// Response timeout for queries, in milliseconds
    pub timeout_ms: u64,
    /// Response timeout for set-command acknowledgments, in milliseconds
    pub ack_timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            variant: ProtocolVariant::Binary,
            candidate_bauds: DEFAULT_CANDIDATE_BAUDS.to_vec(),
            probe_timeout_ms: DEFAULT_PROBE_TIMEOUT_MS,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            ack_timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl SessionConfig {
    /// Speak the given command vocabulary
    pub fn with_variant(mut self, variant: ProtocolVariant) -> Self {
        self.variant = variant;
        self
    }

    /// Rates tried when connecting, in order
    pub fn with_candidates(mut self, candidates: impl Into<Vec<u32>>) -> Self {
        self.candidate_bauds = candidates.into();
        self
    }

    /// Use one timeout for probes, queries and acknowledgments
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        let ms = timeout.as_millis() as u64;
        self.probe_timeout_ms = ms;
        self.timeout_ms = ms;
        self.ack_timeout_ms = ms;
        self
    }

    fn negotiator(&self) -> Negotiator {
        Negotiator::new(self.variant)
            .with_candidates(self.candidate_bauds.clone())
            .with_probe_timeout(Duration::from_millis(self.probe_timeout_ms))
    }
}

/// An open link to the device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    /// Port the device is on
    pub port_name: String,
    /// Negotiated line speed
    pub baud_rate: u32,
    /// Command vocabulary in use
    pub variant: ProtocolVariant,
}

/// Façade over negotiation, the command catalog and the transport
pub struct DeviceSession<T: Transport = SerialTransport> {
    transport: T,
    config: SessionConfig,
    state: ConnectionState,
    connection: Option<Connection>,
    device_state: DeviceState,
    last_negotiation: Vec<ProbeAttempt>,
}

impl DeviceSession<SerialTransport> {
    /// Session over the OS serial port
    pub fn new(config: SessionConfig) -> Self {
        Self::with_transport(SerialTransport::new(), config)
    }

    /// Available serial ports in a stable order
    pub fn list_ports() -> Vec<String> {
        port_names()
    }
}

impl<T: Transport> DeviceSession<T> {
    /// Session over a caller-supplied transport
    pub fn with_transport(transport: T, config: SessionConfig) -> Self {
        Self {
            transport,
            config,
            state: ConnectionState::Disconnected,
            connection: None,
            device_state: DeviceState::new(),
            last_negotiation: Vec::new(),
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Configuration the session was built with
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Snapshot of the last successful read cycle
    pub fn device_state(&self) -> &DeviceState {
        &self.device_state
    }

    /// The open connection, if any
    pub fn connection(&self) -> Option<&Connection> {
        self.connection.as_ref()
    }

    /// Probes issued by the most recent connect attempt
    pub fn last_negotiation(&self) -> &[ProbeAttempt] {
        &self.last_negotiation
    }

    /// Handle that aborts an in-progress exchange from another thread
    pub fn close_handle(&self) -> CloseHandle {
        self.transport.close_handle()
    }

    /// Underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Find the device's baud rate on `port` and open the connection.
    ///
    /// Reads the device settings once connected. A failure of that first
    /// read is logged and leaves the state empty, unless the connection was
    /// closed under it, which fails with [`ConnectError::Cancelled`].
    pub fn connect(&mut self, port: &str) -> Result<Connection, ConnectError> {
        if self.state == ConnectionState::Connected {
            return Err(ConnectError::AlreadyConnected);
        }

        self.transport.close();
        self.connection = None;
        self.device_state = DeviceState::new();
        self.state = ConnectionState::Negotiating;
        info!("connecting to {} ({:?} protocol)", port, self.config.variant);

        let negotiated = match self.config.negotiator().negotiate(&mut self.transport, port) {
            Ok(negotiated) => negotiated,
            Err(e) => {
                self.transport.close();
                self.state = ConnectionState::Error;
                self.last_negotiation.clear();
                return Err(e);
            }
        };

        let connection = Connection {
            port_name: port.to_string(),
            baud_rate: negotiated.baud_rate,
            variant: self.config.variant,
        };
        self.last_negotiation = negotiated.attempts;
        self.connection = Some(connection.clone());
        self.state = ConnectionState::Connected;

        match self.refresh_state().map(|_| ()) {
            Err(ConfigError::Transport(TransportError::Closed)) => {
                info!("connection to {} cancelled during initial read", port);
                self.transport.close();
                self.connection = None;
                self.state = ConnectionState::Disconnected;
                return Err(ConnectError::Cancelled);
            }
            Err(e) => warn!("initial state read on {} failed: {}", port, e),
            Ok(()) => {}
        }

        Ok(connection)
    }

    /// Query every setting and replace the device state.
    ///
    /// A silent device fails with [`TransportError::Timeout`]. On any
    /// transport failure the previous state is kept.
    pub fn refresh_state(&mut self) -> Result<&DeviceState, ConfigError> {
        let variant = self.connected_variant()?;
        let timeout = Duration::from_millis(self.config.timeout_ms);

        let mut next = DeviceState::new();
        for setting in Setting::ALL {
            let response = self.exchange(&variant.query_bytes(setting), timeout)?;
            let reading = variant.parse_reading(setting, &response);
            if !reading.is_known() {
                warn!("{} read as unknown ({} bytes)", setting, response.len());
            }
            next.insert(setting, reading);
        }

        self.device_state = next;
        Ok(&self.device_state)
    }

    /// Validate and send a batch of settings, then re-read the device.
    ///
    /// Nothing is sent unless every value in the batch is valid. Settings go
    /// out in [`Setting`] order; a baud rate change reopens the connection
    /// at the new rate before the next setting. A set command that gets no
    /// answer at all fails with [`TransportError::Timeout`]; an answer that
    /// does not parse is only logged.
    pub fn apply_configuration(&mut self, batch: &ConfigBatch) -> Result<(), ConfigError> {
        let variant = self.connected_variant()?;

        let commands = batch
            .iter()
            .map(|(&setting, &value)| {
                variant
                    .set_bytes(setting, value)
                    .map(|bytes| (setting, value, bytes))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let ack_timeout = Duration::from_millis(self.config.ack_timeout_ms);
        for (setting, value, bytes) in commands {
            let ack = self.exchange(&bytes, ack_timeout)?;
            if !variant.is_well_formed(&ack) {
                warn!("unrecognized acknowledgment for {} = {}", setting, value);
            }
            if let SettingValue::BaudRate(rate) = value {
                self.switch_baud(rate.bps())?;
            }
        }

        self.refresh_state()?;
        Ok(())
    }

    /// Close the connection. Safe to call in any state.
    pub fn disconnect(&mut self) {
        self.transport.close();
        if let Some(conn) = self.connection.take() {
            info!("disconnected from {}", conn.port_name);
        }
        self.state = ConnectionState::Disconnected;
    }

    fn connected_variant(&self) -> Result<ProtocolVariant, ConfigError> {
        match (&self.state, &self.connection) {
            (ConnectionState::Connected, Some(conn)) => Ok(conn.variant),
            _ => Err(ConfigError::NotConnected),
        }
    }

    /// One request/response exchange. An empty read is a timeout.
    fn exchange(&mut self, request: &[u8], timeout: Duration) -> Result<Vec<u8>, TransportError> {
        let limit = self.config.variant.response_limit();
        let result = self
            .transport
            .clear_input()
            .and_then(|_| self.transport.write(request))
            .and_then(|_| self.transport.read_upto(limit, timeout));

        match result {
            Ok(response) if response.is_empty() => {
                warn!("no response to {:02x?}", request);
                Err(TransportError::Timeout)
            }
            Ok(response) => {
                debug!("exchange {:02x?} -> {:02x?}", request, response);
                Ok(response)
            }
            Err(TransportError::Closed) => {
                warn!("connection closed during exchange");
                self.disconnect();
                Err(TransportError::Closed)
            }
            Err(e) => Err(e),
        }
    }

    /// Reopen at the rate the device just switched to
    fn switch_baud(&mut self, baud_rate: u32) -> Result<(), TransportError> {
        let Some(conn) = self.connection.as_mut() else {
            return Err(TransportError::NotOpen);
        };
        if conn.baud_rate == baud_rate {
            return Ok(());
        }

        let port = conn.port_name.clone();
        info!("{}: switching {} -> {} baud", port, conn.baud_rate, baud_rate);
        self.transport.close();
        match self
            .transport
            .open(&port, baud_rate, Duration::from_millis(self.config.timeout_ms))
        {
            Ok(()) => {
                conn.baud_rate = baud_rate;
                Ok(())
            }
            Err(e) => {
                self.connection = None;
                self.state = ConnectionState::Error;
                Err(e)
            }
        }
    }
}

impl<T: Transport> Drop for DeviceSession<T> {
    fn drop(&mut self) {
        self.disconnect();
    }
}
