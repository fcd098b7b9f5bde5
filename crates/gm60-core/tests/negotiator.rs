mod common;

use common::{init_tracing, MockDevice};
use gm60_core::protocol::{
    frame, ConnectError, Negotiator, ProbeOutcome, ProtocolVariant, Transport, TransportError,
    DEFAULT_CANDIDATE_BAUDS,
};
use gm60_core::session::{ConnectionState, DeviceSession, SessionConfig};
use pretty_assertions::assert_eq;
use std::time::Duration;

fn negotiator() -> Negotiator {
    Negotiator::new(ProtocolVariant::Binary).with_probe_timeout(Duration::from_millis(5))
}

#[test]
fn test_converges_to_each_candidate_in_order() {
    init_tracing();
    for (idx, &baud) in DEFAULT_CANDIDATE_BAUDS.iter().enumerate() {
        let mut device = MockDevice::binary(baud);
        let result = negotiator().negotiate(&mut device, "/dev/ttyUSB0").unwrap();

        assert_eq!(result.baud_rate, baud);
        assert_eq!(device.opened(), DEFAULT_CANDIDATE_BAUDS[..=idx].to_vec());
        assert_eq!(result.attempts.len(), idx + 1);
        assert!(device.is_open());
    }
}

#[test]
fn test_device_at_19200_takes_five_probes() {
    init_tracing();
    let device = MockDevice::binary(19200);
    let mut session = DeviceSession::with_transport(device.clone(), SessionConfig::default());

    let conn = session.connect("/dev/ttyUSB0").unwrap();

    assert_eq!(conn.baud_rate, 19200);
    assert_eq!(session.state(), ConnectionState::Connected);
    let probes = session.last_negotiation();
    assert_eq!(probes.len(), 5);
    let failed = probes
        .iter()
        .filter(|p| p.outcome != ProbeOutcome::Answered)
        .count();
    assert_eq!(failed, 4);
    assert_eq!(
        probes.iter().map(|p| p.baud_rate).collect::<Vec<_>>(),
        vec![9600, 1200, 4800, 14400, 19200]
    );
    assert_eq!(device.opened(), vec![9600, 1200, 4800, 14400, 19200]);
}

#[test]
fn test_probe_is_read_mode_query() {
    let mut device = MockDevice::binary(9600);
    negotiator().negotiate(&mut device, "COM4").unwrap();
    assert_eq!(
        device.writes(),
        vec![vec![0x7E, 0x04, 0x00, 0x0A, 0x10, 0x00, 0xA5, 0x44]]
    );
}

#[test]
fn test_no_device_found_leaves_transport_closed() {
    let mut device = MockDevice::binary(9600);
    device.sim().mute = true;

    let err = negotiator().negotiate(&mut device, "COM4").unwrap_err();

    match err {
        ConnectError::NoDeviceFound { port, tried } => {
            assert_eq!(port, "COM4");
            assert_eq!(tried, DEFAULT_CANDIDATE_BAUDS.to_vec());
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(device.opened(), DEFAULT_CANDIDATE_BAUDS.to_vec());
    assert!(!device.is_open());
}

#[test]
fn test_missing_port_aborts_sweep() {
    let mut device = MockDevice::binary(9600);
    device.sim().port_missing = true;

    let err = negotiator().negotiate(&mut device, "/dev/ttyUSB9").unwrap_err();

    assert!(matches!(
        err,
        ConnectError::Transport(TransportError::PortUnavailable { .. })
    ));
    assert!(device.opened().is_empty());
    assert!(!device.is_open());
}

#[test]
fn test_garbage_at_wrong_rate_moves_on() {
    let mut device = MockDevice::binary(1200);
    device
        .sim()
        .scripted
        .push_back(vec![0xF0, 0x7E, 0x1C, 0x00, 0xE3, 0x7E]);

    let result = negotiator().negotiate(&mut device, "COM4").unwrap();

    assert_eq!(result.baud_rate, 1200);
    assert_eq!(
        result.attempts.iter().map(|a| a.outcome).collect::<Vec<_>>(),
        vec![ProbeOutcome::Malformed, ProbeOutcome::Answered]
    );
}

#[test]
fn test_unterminated_text_reply_moves_on() {
    let mut device = MockDevice::new(ProtocolVariant::Legacy, 57600);
    // A single printable byte, as line noise at the wrong rate often decodes
    device.sim().scripted.push_back(b"x".to_vec());

    let result = Negotiator::new(ProtocolVariant::Legacy)
        .with_probe_timeout(Duration::from_millis(5))
        .negotiate(&mut device, "COM4")
        .unwrap();

    assert_eq!(result.baud_rate, 57600);
    assert_eq!(result.attempts[0].baud_rate, 9600);
    assert_eq!(result.attempts[0].outcome, ProbeOutcome::Malformed);
    assert_eq!(result.attempts.last().map(|a| a.outcome), Some(ProbeOutcome::Answered));
}

#[test]
fn test_noise_before_valid_frame_is_accepted() {
    let mut device = MockDevice::binary(38400);
    let mut noisy = vec![0x00, 0xFF];
    noisy.extend(frame::encode(0x10, 0x02));
    device.sim().scripted.push_back(noisy);

    let result = negotiator().negotiate(&mut device, "COM4").unwrap();

    // The scripted answer lands on the first probe, at 9600
    assert_eq!(result.baud_rate, 9600);
}

#[test]
fn test_custom_candidate_order_is_respected() {
    let mut device = MockDevice::binary(9600);
    let result = negotiator()
        .with_candidates([115200u32, 57600, 9600])
        .negotiate(&mut device, "COM4")
        .unwrap();

    assert_eq!(result.baud_rate, 9600);
    assert_eq!(device.opened(), vec![115200, 57600, 9600]);
}

#[test]
fn test_failed_connect_sets_error_state() {
    let device = MockDevice::binary(9600);
    device.sim().mute = true;
    let config = SessionConfig::default().with_timeout(Duration::from_millis(2));
    let mut session = DeviceSession::with_transport(device.clone(), config);

    assert!(matches!(
        session.connect("COM4"),
        Err(ConnectError::NoDeviceFound { .. })
    ));
    assert_eq!(session.state(), ConnectionState::Error);
    assert!(session.connection().is_none());
    assert!(!device.is_open());
}
