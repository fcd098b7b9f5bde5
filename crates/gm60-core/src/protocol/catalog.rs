//! Command catalog
//!
//! Maps each [`Setting`] to its wire-level query and set commands, and maps
//! response payloads back to semantic values.
//!
//! The byte constants below follow observed device traffic. They are the one
//! place to change if a firmware revision uses different codes.

use serde::{Deserialize, Serialize};

use super::frame::{self, Frame};
use super::{legacy, UnsupportedValueError};
use crate::settings::{
    BaudRate, ColorMode, LedBrightness, LedMode, ReadMode, Reading, Setting, SettingValue,
};

/// Payload carried by every query frame
pub const QUERY_PAYLOAD: u8 = 0x00;

/// Wire encoding of one setting in the binary protocol
#[derive(Debug)]
pub struct CatalogEntry {
    /// Setting this entry encodes
    pub setting: Setting,
    /// Command code of the query frame (echoed by the response)
    pub query_code: u8,
    /// Command code of the set frame
    pub set_code: u8,
    /// Value ↔ payload byte
    pub values: &'static [(SettingValue, u8)],
}

impl CatalogEntry {
    /// Payload byte for a value, if it belongs to this setting
    pub fn encode(&self, value: SettingValue) -> Option<u8> {
        self.values.iter().find(|(v, _)| *v == value).map(|(_, b)| *b)
    }

    /// Value for a payload byte, if it is in the table
    pub fn decode(&self, payload: u8) -> Option<SettingValue> {
        self.values.iter().find(|(_, b)| *b == payload).map(|(v, _)| *v)
    }
}

static CATALOG: [CatalogEntry; 5] = [
    CatalogEntry {
        setting: Setting::ReadMode,
        query_code: 0x10,
        set_code: 0x11,
        values: &[
            (SettingValue::ReadMode(ReadMode::Continuous), 0x02),
            (SettingValue::ReadMode(ReadMode::Induction), 0x03),
        ],
    },
    CatalogEntry {
        setting: Setting::BaudRate,
        query_code: 0x20,
        set_code: 0x21,
        values: &[
            (SettingValue::BaudRate(BaudRate::B1200), 0x01),
            (SettingValue::BaudRate(BaudRate::B4800), 0x02),
            (SettingValue::BaudRate(BaudRate::B9600), 0x03),
            (SettingValue::BaudRate(BaudRate::B14400), 0x04),
            (SettingValue::BaudRate(BaudRate::B19200), 0x05),
            (SettingValue::BaudRate(BaudRate::B38400), 0x06),
            (SettingValue::BaudRate(BaudRate::B57600), 0x07),
            (SettingValue::BaudRate(BaudRate::B115200), 0x08),
        ],
    },
    CatalogEntry {
        setting: Setting::LedMode,
        query_code: 0x30,
        set_code: 0x31,
        values: &[
            (SettingValue::LedMode(LedMode::Off), 0x00),
            (SettingValue::LedMode(LedMode::Normal), 0x01),
            (SettingValue::LedMode(LedMode::AlwaysOn), 0x02),
        ],
    },
    CatalogEntry {
        setting: Setting::LedBrightness,
        query_code: 0x40,
        set_code: 0x41,
        values: &[
            (SettingValue::LedBrightness(LedBrightness::Low), 0x01),
            (SettingValue::LedBrightness(LedBrightness::Middle), 0x32),
            (SettingValue::LedBrightness(LedBrightness::High), 0x63),
        ],
    },
    CatalogEntry {
        setting: Setting::ColorMode,
        query_code: 0x50,
        set_code: 0x51,
        values: &[
            (SettingValue::ColorMode(ColorMode::Normal), 0x00),
            (SettingValue::ColorMode(ColorMode::Inverse), 0x01),
            (SettingValue::ColorMode(ColorMode::Both), 0x02),
        ],
    },
];

/// Catalog entry for a setting
pub fn entry(setting: Setting) -> &'static CatalogEntry {
    // CATALOG is declared in Setting order
    &CATALOG[setting as usize]
}

/// Query frame for a setting
pub fn query(setting: Setting) -> Frame {
    Frame::new(entry(setting).query_code, QUERY_PAYLOAD)
}

/// Set frame for a value. Fails before building anything if the value is
/// outside the setting's domain.
pub fn apply(setting: Setting, value: SettingValue) -> Result<Frame, UnsupportedValueError> {
    let entry = entry(setting);
    let payload = entry
        .encode(value)
        .ok_or_else(|| UnsupportedValueError::new(setting, value.label()))?;
    Ok(Frame::new(entry.set_code, payload))
}

/// Decode a response payload byte for a setting
pub fn decode(setting: Setting, payload: u8) -> Reading {
    entry(setting)
        .decode(payload)
        .map_or(Reading::Unknown, Reading::Known)
}

/// Decode a response frame to a query for `setting`.
///
/// A frame answering a different command reads as `Unknown`.
pub fn decode_response(setting: Setting, response: &Frame) -> Reading {
    if response.command != entry(setting).query_code {
        return Reading::Unknown;
    }
    decode(setting, response.payload)
}

/// Which command vocabulary the device speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProtocolVariant {
    /// Checksummed binary frames
    #[default]
    Binary,
    /// CRLF-terminated ASCII commands
    Legacy,
}

impl ProtocolVariant {
    /// Bytes sent to test whether the device answers at the current rate
    pub fn probe(&self) -> Vec<u8> {
        self.query_bytes(Setting::ReadMode)
    }

    /// Wire bytes of the query for a setting
    pub fn query_bytes(&self, setting: Setting) -> Vec<u8> {
        match self {
            ProtocolVariant::Binary => query(setting).to_bytes(),
            ProtocolVariant::Legacy => legacy::to_line(legacy::query_command(setting)),
        }
    }

    /// Wire bytes of the set command for a value
    pub fn set_bytes(
        &self,
        setting: Setting,
        value: SettingValue,
    ) -> Result<Vec<u8>, UnsupportedValueError> {
        match self {
            ProtocolVariant::Binary => Ok(apply(setting, value)?.to_bytes()),
            ProtocolVariant::Legacy => Ok(legacy::to_line(&legacy::set_command(setting, value)?)),
        }
    }

    /// Whether a response is well-formed, regardless of its meaning
    pub fn is_well_formed(&self, response: &[u8]) -> bool {
        match self {
            ProtocolVariant::Binary => frame::scan(response).is_some(),
            ProtocolVariant::Legacy => legacy::parse_response(response).is_some(),
        }
    }

    /// Decode the response to a query for `setting`
    pub fn parse_reading(&self, setting: Setting, response: &[u8]) -> Reading {
        match self {
            ProtocolVariant::Binary => frame::scan(response)
                .map_or(Reading::Unknown, |f| decode_response(setting, &f)),
            ProtocolVariant::Legacy => legacy::parse_response(response)
                .map_or(Reading::Unknown, |token| legacy::decode_token(setting, &token)),
        }
    }

    /// Upper bound on bytes to read for one response
    pub fn response_limit(&self) -> usize {
        match self {
            ProtocolVariant::Binary => 4 * frame::FRAME_LEN,
            ProtocolVariant::Legacy => legacy::MAX_LINE_LEN,
        }
    }
}
