//! GM60 Scanner Probe Tool
//!
//! Finds a GM60 scanner's baud rate, prints its settings, and optionally
//! applies new ones.
//!
//! Usage:
//!   cargo run --example gm60_probe -- [OPTIONS] [PORT]
//!
//! Options:
//!   --legacy              Use the CRLF text protocol
//!   --timeout MS          Response timeout in ms (default: 1000)
//!   --set SETTING=LABEL   Apply a setting, e.g. --set "Read Mode=Induction Mode"
//!   --list                List serial ports and exit

use gm60_core::prelude::*;
use std::time::Duration;

fn parse_setting(name: &str) -> Option<Setting> {
    Setting::ALL
        .iter()
        .copied()
        .find(|s| s.label().eq_ignore_ascii_case(name.trim()))
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().collect();

    let mut port_name: Option<String> = None;
    let mut config = SessionConfig::default();
    let mut batch = ConfigBatch::new();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--legacy" => config = config.with_variant(ProtocolVariant::Legacy),
            "--timeout" | "-t" => {
                i += 1;
                if let Some(ms) = args.get(i).and_then(|a| a.parse().ok()) {
                    config = config.with_timeout(Duration::from_millis(ms));
                }
            }
            "--set" | "-s" => {
                i += 1;
                let Some((name, label)) = args.get(i).and_then(|a| a.split_once('=')) else {
                    eprintln!("--set expects SETTING=LABEL");
                    std::process::exit(2);
                };
                let Some(setting) = parse_setting(name) else {
                    eprintln!("Unknown setting '{}'", name);
                    std::process::exit(2);
                };
                match SettingValue::parse(setting, label) {
                    Ok(value) => {
                        batch.insert(setting, value);
                    }
                    Err(e) => {
                        eprintln!("{}", e);
                        std::process::exit(2);
                    }
                }
            }
            "--list" | "-l" => {
                for port in DeviceSession::list_ports() {
                    println!("{}", port);
                }
                return;
            }
            other => port_name = Some(other.to_string()),
        }
        i += 1;
    }

    let Some(port_name) = port_name.or_else(|| DeviceSession::list_ports().into_iter().next()) else {
        eprintln!("No serial ports found");
        std::process::exit(1);
    };

    let mut session = DeviceSession::new(config);
    match session.connect(&port_name) {
        Ok(conn) => println!("Connected to {} at {} baud", conn.port_name, conn.baud_rate),
        Err(e) => {
            eprintln!("Connection failed: {}", e);
            std::process::exit(1);
        }
    }

    if !batch.is_empty() {
        if let Err(e) = session.apply_configuration(&batch) {
            eprintln!("Configuration failed: {}", e);
            std::process::exit(1);
        }
        println!("Configuration applied");
    }

    for (setting, reading) in session.device_state().iter() {
        println!("{:>15}: {}", setting, reading);
    }

    session.disconnect();
}
