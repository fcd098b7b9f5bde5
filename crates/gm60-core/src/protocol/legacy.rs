//! Legacy text protocol
//!
//! Older firmware accepts ASCII commands terminated by CRLF (`VAL1?`,
//! `SET 02`, `SET BAUD 57600`) and answers with a single ASCII token.

use super::UnsupportedValueError;
use crate::settings::{
    BaudRate, ColorMode, LedBrightness, LedMode, ReadMode, Reading, Setting, SettingValue,
};

/// Line terminator for commands and responses
pub const LINE_END: &[u8] = b"\r\n";

/// Longest response line read back
pub const MAX_LINE_LEN: usize = 100;

static TOKENS: &[(SettingValue, &str)] = &[
    (SettingValue::ReadMode(ReadMode::Continuous), "02"),
    (SettingValue::ReadMode(ReadMode::Induction), "03"),
    (SettingValue::BaudRate(BaudRate::B9600), "9600"),
    (SettingValue::BaudRate(BaudRate::B19200), "19200"),
    (SettingValue::BaudRate(BaudRate::B38400), "38400"),
    (SettingValue::BaudRate(BaudRate::B57600), "57600"),
    (SettingValue::BaudRate(BaudRate::B115200), "115200"),
    (SettingValue::LedMode(LedMode::Off), "00"),
    (SettingValue::LedMode(LedMode::Normal), "01"),
    (SettingValue::LedMode(LedMode::AlwaysOn), "02"),
    (SettingValue::LedBrightness(LedBrightness::Low), "01"),
    (SettingValue::LedBrightness(LedBrightness::Middle), "50"),
    (SettingValue::LedBrightness(LedBrightness::High), "99"),
    (SettingValue::ColorMode(ColorMode::Normal), "00"),
    (SettingValue::ColorMode(ColorMode::Inverse), "01"),
    (SettingValue::ColorMode(ColorMode::Both), "02"),
];

/// Query command for a setting
pub fn query_command(setting: Setting) -> &'static str {
    match setting {
        Setting::ReadMode => "VAL1?",
        Setting::BaudRate => "BAUD?",
        Setting::LedMode => "LED?",
        Setting::LedBrightness => "BRIGHT?",
        Setting::ColorMode => "COLOR?",
    }
}

fn set_prefix(setting: Setting) -> &'static str {
    match setting {
        Setting::ReadMode => "SET",
        Setting::BaudRate => "SET BAUD",
        Setting::LedMode => "SET LED",
        Setting::LedBrightness => "SET BRIGHT",
        Setting::ColorMode => "SET COLOR",
    }
}

/// Token the device uses for a value, if the text protocol supports it
pub fn token(value: SettingValue) -> Option<&'static str> {
    TOKENS.iter().find(|(v, _)| *v == value).map(|(_, t)| *t)
}

/// Set command for a value
pub fn set_command(setting: Setting, value: SettingValue) -> Result<String, UnsupportedValueError> {
    if value.setting() != setting {
        return Err(UnsupportedValueError::new(setting, value.label()));
    }
    let token = token(value).ok_or_else(|| UnsupportedValueError::new(setting, value.label()))?;
    Ok(format!("{} {}", set_prefix(setting), token))
}

/// Decode a response token for a setting
pub fn decode_token(setting: Setting, token: &str) -> Reading {
    TOKENS
        .iter()
        .find(|(v, t)| v.setting() == setting && *t == token)
        .map_or(Reading::Unknown, |(v, _)| Reading::Known(*v))
}

/// Terminate a command for transmission
pub fn to_line(command: &str) -> Vec<u8> {
    let mut bytes = command.as_bytes().to_vec();
    bytes.extend_from_slice(LINE_END);
    bytes
}

/// Extract the response token from a CRLF-terminated line of printable
/// ASCII. Unterminated input is rejected.
pub fn parse_response(raw: &[u8]) -> Option<String> {
    let line = raw.strip_suffix(LINE_END)?;
    let text = std::str::from_utf8(line).ok()?.trim();
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_graphic() || b == b' ') {
        return None;
    }
    Some(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_commands() {
        assert_eq!(
            set_command(Setting::ReadMode, SettingValue::ReadMode(ReadMode::Induction)).unwrap(),
            "SET 03"
        );
        assert_eq!(
            set_command(Setting::BaudRate, SettingValue::BaudRate(BaudRate::B57600)).unwrap(),
            "SET BAUD 57600"
        );
        assert_eq!(
            set_command(
                Setting::LedBrightness,
                SettingValue::LedBrightness(LedBrightness::Middle)
            )
            .unwrap(),
            "SET BRIGHT 50"
        );
    }

    #[test]
    fn test_slow_rates_unsupported() {
        let err = set_command(Setting::BaudRate, SettingValue::BaudRate(BaudRate::B1200)).unwrap_err();
        assert_eq!(err.value, "1200");
    }

    #[test]
    fn test_tokens_are_per_setting() {
        // "02" means Continuous for the read mode and AlwaysOn for the LED
        assert_eq!(
            decode_token(Setting::ReadMode, "02"),
            Reading::Known(SettingValue::ReadMode(ReadMode::Continuous))
        );
        assert_eq!(
            decode_token(Setting::LedMode, "02"),
            Reading::Known(SettingValue::LedMode(LedMode::AlwaysOn))
        );
        assert_eq!(decode_token(Setting::ReadMode, "04"), Reading::Unknown);
    }

    #[test]
    fn test_line_framing() {
        assert_eq!(to_line("VAL1?"), b"VAL1?\r\n".to_vec());
        assert_eq!(parse_response(b"03\r\n"), Some("03".to_string()));
        assert_eq!(parse_response(b"\r\n"), None);
        assert_eq!(parse_response(&[0xFF, 0x00, 0x13]), None);
    }

    #[test]
    fn test_unterminated_response_rejected() {
        assert_eq!(parse_response(b"x"), None);
        assert_eq!(parse_response(b"03"), None);
        assert_eq!(parse_response(b"03\r"), None);
        assert_eq!(parse_response(b" 03 \r\n"), Some("03".to_string()));
    }
}
