//! Scripted scanner for protocol tests.
//!
//! [`MockDevice`] implements [`Transport`] over a simulated scanner that
//! answers only at its configured baud rate, keeps its own settings, and
//! logs every open and write. Clones share the same simulated device, so a
//! test can keep one clone for inspection while a session owns another.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use gm60_core::protocol::catalog::{self, ProtocolVariant};
use gm60_core::protocol::{frame, legacy, CloseHandle, Transport, TransportError};
use gm60_core::settings::{
    BaudRate, ColorMode, LedBrightness, LedMode, ReadMode, Setting, SettingValue,
};

/// Simulated device state
pub struct DeviceSim {
    pub variant: ProtocolVariant,
    /// Rate the device listens at
    pub device_baud: u32,
    pub settings: HashMap<Setting, SettingValue>,
    /// Every rate the transport was opened at
    pub opened: Vec<u32>,
    /// Every write, as sent
    pub writes: Vec<Vec<u8>>,
    /// Fail writes once this many more have succeeded
    pub fail_writes_after: Option<usize>,
    /// Fire the close handle once this many more writes have gone out
    pub close_after_writes: Option<usize>,
    /// Reject opens as if the port did not exist
    pub port_missing: bool,
    /// Never answer; reads wait out their full timeout
    pub mute: bool,
    /// Answers queued ahead of the simulated device's own
    pub scripted: VecDeque<Vec<u8>>,
    open_at: Option<u32>,
    pending: Vec<u8>,
}

impl DeviceSim {
    fn respond(&mut self, bytes: &[u8]) {
        if let Some(reply) = self.scripted.pop_front() {
            self.pending = reply;
            return;
        }
        if self.mute || self.open_at != Some(self.device_baud) {
            return;
        }
        let reply = match self.variant {
            ProtocolVariant::Binary => self.respond_binary(bytes),
            ProtocolVariant::Legacy => self.respond_legacy(bytes),
        };
        if let Some(reply) = reply {
            self.pending = reply;
        }
    }

    fn respond_binary(&mut self, bytes: &[u8]) -> Option<Vec<u8>> {
        let request = frame::decode(bytes).ok()?;
        for setting in Setting::ALL {
            let entry = catalog::entry(setting);
            if request.command == entry.query_code {
                let payload = entry.encode(self.settings[&setting]).unwrap_or(0xFF);
                return Some(frame::encode(entry.query_code, payload));
            }
            if request.command == entry.set_code {
                let value = entry.decode(request.payload)?;
                let ack = frame::encode(entry.set_code, request.payload);
                self.store(setting, value);
                return Some(ack);
            }
        }
        None
    }

    fn respond_legacy(&mut self, bytes: &[u8]) -> Option<Vec<u8>> {
        let line = std::str::from_utf8(bytes).ok()?.trim_end_matches("\r\n");
        for setting in Setting::ALL {
            if line == legacy::query_command(setting) {
                let token = legacy::token(self.settings[&setting]).unwrap_or("??");
                return Some(legacy::to_line(token));
            }
            for value in setting.domain() {
                if legacy::set_command(setting, value).ok().as_deref() == Some(line) {
                    self.store(setting, value);
                    return Some(legacy::to_line("OK"));
                }
            }
        }
        None
    }

    fn store(&mut self, setting: Setting, value: SettingValue) {
        self.settings.insert(setting, value);
        if let SettingValue::BaudRate(rate) = value {
            // The acknowledgment still goes out at the old rate
            self.device_baud = rate.bps();
        }
    }
}

/// Shared handle to a simulated scanner
#[derive(Clone)]
pub struct MockDevice {
    sim: Arc<Mutex<DeviceSim>>,
    handle: CloseHandle,
}

impl MockDevice {
    /// Scanner listening at `device_baud` with factory settings
    pub fn new(variant: ProtocolVariant, device_baud: u32) -> Self {
        let settings = HashMap::from([
            (Setting::ReadMode, SettingValue::ReadMode(ReadMode::Continuous)),
            (
                Setting::BaudRate,
                SettingValue::BaudRate(BaudRate::from_bps(device_baud).unwrap_or(BaudRate::B9600)),
            ),
            (Setting::LedMode, SettingValue::LedMode(LedMode::Normal)),
            (Setting::LedBrightness, SettingValue::LedBrightness(LedBrightness::Middle)),
            (Setting::ColorMode, SettingValue::ColorMode(ColorMode::Normal)),
        ]);
        Self {
            sim: Arc::new(Mutex::new(DeviceSim {
                variant,
                device_baud,
                settings,
                opened: Vec::new(),
                writes: Vec::new(),
                fail_writes_after: None,
                close_after_writes: None,
                port_missing: false,
                mute: false,
                scripted: VecDeque::new(),
                open_at: None,
                pending: Vec::new(),
            })),
            handle: CloseHandle::new(),
        }
    }

    pub fn binary(device_baud: u32) -> Self {
        Self::new(ProtocolVariant::Binary, device_baud)
    }

    pub fn sim(&self) -> MutexGuard<'_, DeviceSim> {
        self.sim.lock().expect("mock device lock poisoned")
    }

    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.sim().writes.clone()
    }

    pub fn opened(&self) -> Vec<u32> {
        self.sim().opened.clone()
    }

    pub fn clear_log(&self) {
        let mut sim = self.sim();
        sim.writes.clear();
        sim.opened.clear();
    }
}

impl Transport for MockDevice {
    fn open(&mut self, port_name: &str, baud_rate: u32, _timeout: Duration) -> Result<(), TransportError> {
        let mut sim = self.sim();
        if sim.port_missing {
            return Err(TransportError::PortUnavailable {
                port: port_name.to_string(),
                reason: "No such file or directory".to_string(),
            });
        }
        sim.opened.push(baud_rate);
        sim.open_at = Some(baud_rate);
        sim.pending.clear();
        self.handle.reset();
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        if self.handle.is_closed() {
            return Err(TransportError::Closed);
        }
        let mut sim = self.sim();
        if sim.open_at.is_none() {
            return Err(TransportError::NotOpen);
        }
        if let Some(remaining) = sim.fail_writes_after {
            if remaining == 0 {
                return Err(TransportError::SerialError("device unplugged".to_string()));
            }
            sim.fail_writes_after = Some(remaining - 1);
        }
        sim.writes.push(bytes.to_vec());
        sim.respond(bytes);
        if let Some(remaining) = sim.close_after_writes {
            if remaining <= 1 {
                sim.close_after_writes = None;
                self.handle.close();
            } else {
                sim.close_after_writes = Some(remaining - 1);
            }
        }
        Ok(())
    }

    fn read_upto(&mut self, n: usize, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        let start = Instant::now();
        loop {
            if self.handle.is_closed() {
                return Err(TransportError::Closed);
            }
            {
                let mut sim = self.sim();
                if !sim.pending.is_empty() {
                    let take = n.min(sim.pending.len());
                    return Ok(sim.pending.drain(..take).collect());
                }
                if !sim.mute {
                    return Ok(Vec::new());
                }
            }
            if start.elapsed() >= timeout {
                return Ok(Vec::new());
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    fn close(&mut self) {
        let mut sim = self.sim();
        sim.open_at = None;
        sim.pending.clear();
        self.handle.close();
    }

    fn is_open(&self) -> bool {
        self.sim().open_at.is_some() && !self.handle.is_closed()
    }

    fn close_handle(&self) -> CloseHandle {
        self.handle.clone()
    }
}

/// Install a test log subscriber once per test binary
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Decoded frames among the writes whose command is a set command
pub fn set_frames(writes: &[Vec<u8>]) -> Vec<frame::Frame> {
    writes
        .iter()
        .filter_map(|w| frame::decode(w).ok())
        .filter(|f| Setting::ALL.iter().any(|s| catalog::entry(*s).set_code == f.command))
        .collect()
}
