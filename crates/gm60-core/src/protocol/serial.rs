//! Serial port handling
//!
//! Provides low-level serial port access for scanner communication.

use serialport::{SerialPort, SerialPortInfo, SerialPortType};
use std::collections::BTreeMap;
#[cfg(target_os = "linux")]
use std::fs;
use std::io::{Read, Write};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::transport::{transmit_time, CloseHandle, Transport};
use super::TransportError;

/// Interval between `bytes_to_read` polls
const POLL_INTERVAL: Duration = Duration::from_millis(2);

/// Silence after the last received byte that ends a response
const INTER_CHAR_GAP: Duration = Duration::from_millis(25);

/// Pause after opening before the first write
const DEFAULT_SETTLE: Duration = Duration::from_millis(50);

/// Information about an available serial port
#[derive(Debug, Clone)]
pub struct PortInfo {
    /// Port name (e.g., "/dev/ttyUSB0" or "COM3")
    pub name: String,

    /// USB vendor ID (if USB device)
    pub vid: Option<u16>,

    /// USB product ID (if USB device)
    pub pid: Option<u16>,

    /// Product name (if available)
    pub product: Option<String>,
}

impl PortInfo {
    fn bare(name: String) -> Self {
        Self {
            name,
            vid: None,
            pid: None,
            product: None,
        }
    }
}

impl From<SerialPortInfo> for PortInfo {
    fn from(info: SerialPortInfo) -> Self {
        match info.port_type {
            SerialPortType::UsbPort(usb_info) => Self {
                name: info.port_name,
                vid: Some(usb_info.vid),
                pid: Some(usb_info.pid),
                product: usb_info.product,
            },
            _ => Self::bare(info.port_name),
        }
    }
}

/// Device-node families scanners usually enumerate as, in preference order
const PREFERRED_PREFIXES: [&str; 2] = ["ttyACM", "ttyUSB"];

/// Ordering key: CDC-ACM nodes, then USB-serial nodes, then the rest.
///
/// Names sharing a prefix compare by their numeric suffix, so `COM2`
/// precedes `COM10`.
fn port_sort_key(name: &str) -> (usize, String, u32, String) {
    let basename = name.rsplit('/').next().unwrap_or(name);
    let digits = basename.len() - basename.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    let (prefix, suffix) = basename.split_at(basename.len() - digits);
    let rank = PREFERRED_PREFIXES
        .iter()
        .position(|p| *p == prefix)
        .unwrap_or(PREFERRED_PREFIXES.len());
    let number = suffix.parse().unwrap_or(u32::MAX);
    (rank, prefix.to_string(), number, basename.to_string())
}

/// ACM/USB nodes present in /dev, which the enumeration API can miss
/// right after a scanner is plugged in
#[cfg(target_os = "linux")]
fn dev_nodes() -> Vec<String> {
    let Ok(entries) = fs::read_dir("/dev") else {
        return Vec::new();
    };
    entries
        .flatten()
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|fname| PREFERRED_PREFIXES.iter().any(|p| fname.starts_with(p)))
        .map(|fname| format!("/dev/{}", fname))
        .collect()
}

#[cfg(not(target_os = "linux"))]
fn dev_nodes() -> Vec<String> {
    Vec::new()
}

/// Serial ports on this host, scanner-likely nodes first
pub fn list_ports() -> Vec<PortInfo> {
    let mut found: BTreeMap<String, PortInfo> = BTreeMap::new();
    match serialport::available_ports() {
        Ok(ports) => {
            for port in ports.into_iter().map(PortInfo::from) {
                found.entry(port.name.clone()).or_insert(port);
            }
        }
        Err(e) => warn!("serial port enumeration failed: {}", e),
    }
    for name in dev_nodes() {
        found.entry(name.clone()).or_insert_with(|| PortInfo::bare(name));
    }

    let mut ports: Vec<PortInfo> = found.into_values().collect();
    ports.sort_by_cached_key(|p| port_sort_key(&p.name));
    ports
}

/// Names of all available ports, in [`list_ports`] order
pub fn port_names() -> Vec<String> {
    list_ports().into_iter().map(|p| p.name).collect()
}

fn serial_err(e: impl std::fmt::Display) -> TransportError {
    TransportError::SerialError(e.to_string())
}

/// Configure a serial port for scanner communication: 8N1, no flow control
fn configure_port(port: &mut dyn SerialPort) -> Result<(), TransportError> {
    port.set_data_bits(serialport::DataBits::Eight).map_err(serial_err)?;
    port.set_parity(serialport::Parity::None).map_err(serial_err)?;
    port.set_stop_bits(serialport::StopBits::One).map_err(serial_err)?;
    port.set_flow_control(serialport::FlowControl::None).map_err(serial_err)?;

    // Some USB bridges hold the scanner in reset while DTR is low
    if let Err(e) = port.write_data_terminal_ready(true) {
        warn!("failed to set DTR high: {} (continuing)", e);
    }
    if let Err(e) = port.write_request_to_send(true) {
        warn!("failed to set RTS high: {} (continuing)", e);
    }

    Ok(())
}

/// [`Transport`] over an OS serial port
pub struct SerialTransport {
    port: Option<Box<dyn SerialPort>>,
    baud_rate: u32,
    settle: Duration,
    close_handle: CloseHandle,
}

impl SerialTransport {
    /// A transport with no port open
    pub fn new() -> Self {
        Self {
            port: None,
            baud_rate: 0,
            settle: DEFAULT_SETTLE,
            close_handle: CloseHandle::new(),
        }
    }

    /// Pause after each open before the port is used
    pub fn with_settle_delay(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// Rate the port is currently open at
    pub fn baud_rate(&self) -> Option<u32> {
        self.port.as_ref().map(|_| self.baud_rate)
    }

    fn live_port(&mut self) -> Result<&mut Box<dyn SerialPort>, TransportError> {
        if self.close_handle.is_closed() {
            if self.port.take().is_some() {
                debug!("serial: close requested, dropping port");
            }
            return Err(TransportError::Closed);
        }
        self.port.as_mut().ok_or(TransportError::NotOpen)
    }
}

impl Default for SerialTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for SerialTransport {
    fn open(&mut self, port_name: &str, baud_rate: u32, timeout: Duration) -> Result<(), TransportError> {
        self.close();
        self.close_handle.reset();

        let mut port = serialport::new(port_name, baud_rate)
            .timeout(timeout)
            .open()
            .map_err(|e| TransportError::PortUnavailable {
                port: port_name.to_string(),
                reason: e.to_string(),
            })?;
        configure_port(port.as_mut())?;

        if !self.settle.is_zero() {
            std::thread::sleep(self.settle);
        }
        port.clear(serialport::ClearBuffer::All).map_err(serial_err)?;

        debug!("serial: opened {} at {} baud", port_name, baud_rate);
        self.port = Some(port);
        self.baud_rate = baud_rate;
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let baud_rate = self.baud_rate;
        let port = self.live_port()?;
        debug!("serial: write {:02x?}", bytes);
        port.write_all(bytes)?;
        // flush() drains via tcdrain, which can stall on some USB bridges;
        // wait out the line time instead
        std::thread::sleep(transmit_time(bytes.len(), baud_rate) + Duration::from_millis(2));
        Ok(())
    }

    fn read_upto(&mut self, n: usize, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        let mut response = Vec::with_capacity(n);
        let mut buffer = [0u8; 256];
        let start = Instant::now();
        let mut last_data: Option<Instant> = None;

        while response.len() < n && start.elapsed() < timeout {
            let port = self.live_port()?;
            let available = port.bytes_to_read().map_err(serial_err)? as usize;

            if available > 0 {
                let to_read = available.min(n - response.len()).min(buffer.len());
                match port.read(&mut buffer[..to_read]) {
                    Ok(0) => break,
                    Ok(read) => {
                        response.extend_from_slice(&buffer[..read]);
                        last_data = Some(Instant::now());
                    }
                    Err(ref e)
                        if e.kind() == std::io::ErrorKind::TimedOut
                            || e.kind() == std::io::ErrorKind::WouldBlock => {}
                    Err(e) => return Err(e.into()),
                }
                continue;
            }

            if last_data.is_some_and(|t| t.elapsed() >= INTER_CHAR_GAP) {
                break;
            }
            std::thread::sleep(POLL_INTERVAL);
        }

        // A close that lands during the final sleep still wins over a short read
        if self.close_handle.is_closed() {
            self.port = None;
            return Err(TransportError::Closed);
        }

        debug!(
            "serial: read {} bytes in {}ms: {:02x?}",
            response.len(),
            start.elapsed().as_millis(),
            response
        );
        Ok(response)
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            debug!("serial: closed");
        }
        self.close_handle.close();
    }

    fn is_open(&self) -> bool {
        self.port.is_some() && !self.close_handle.is_closed()
    }

    fn clear_input(&mut self) -> Result<(), TransportError> {
        let port = self.live_port()?;
        port.clear(serialport::ClearBuffer::Input).map_err(serial_err)
    }

    fn close_handle(&self) -> CloseHandle {
        self.close_handle.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_ports_is_ordered() {
        let names: Vec<String> = list_ports().into_iter().map(|p| p.name).collect();
        let mut sorted = names.clone();
        sorted.sort_by_cached_key(|n| port_sort_key(n));
        assert_eq!(names, sorted);
    }

    #[test]
    fn test_scanner_nodes_sort_first() {
        let mut names = vec![
            "COM10",
            "/dev/ttyUSB1",
            "/dev/ttyS0",
            "/dev/ttyACM10",
            "COM2",
            "/dev/ttyUSB0",
            "/dev/ttyACM2",
        ];
        names.sort_by_cached_key(|n| port_sort_key(n));

        assert_eq!(
            names,
            vec![
                "/dev/ttyACM2",
                "/dev/ttyACM10",
                "/dev/ttyUSB0",
                "/dev/ttyUSB1",
                "COM2",
                "COM10",
                "/dev/ttyS0",
            ]
        );
    }

    #[test]
    fn test_unopened_transport() {
        let mut transport = SerialTransport::new();
        assert!(!transport.is_open());
        assert!(matches!(transport.write(b"x"), Err(TransportError::NotOpen)));
        transport.close();
        transport.close();
        assert!(matches!(
            transport.read_upto(8, Duration::from_millis(10)),
            Err(TransportError::Closed)
        ));
    }

    #[test]
    fn test_open_missing_port() {
        let mut transport = SerialTransport::new().with_settle_delay(Duration::ZERO);
        let err = transport
            .open("/dev/gm60-does-not-exist", 9600, Duration::from_millis(10))
            .unwrap_err();
        assert!(matches!(err, TransportError::PortUnavailable { .. }));
        assert!(!transport.is_open());
    }
}
