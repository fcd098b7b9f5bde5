//! Device settings
//!
//! The configurable properties of the scanner, the finite domain of each,
//! and the snapshot of what the device last reported.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::protocol::UnsupportedValueError;

/// A configurable device property.
///
/// The declaration order is the order settings are queried and applied in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Setting {
    /// Continuous or triggered scanning
    ReadMode,
    /// Serial line speed
    BaudRate,
    /// Illumination LED behaviour
    LedMode,
    /// Illumination LED brightness
    LedBrightness,
    /// Code polarity
    ColorMode,
}

impl Setting {
    /// Every setting, in query/apply order
    pub const ALL: [Setting; 5] = [
        Setting::ReadMode,
        Setting::BaudRate,
        Setting::LedMode,
        Setting::LedBrightness,
        Setting::ColorMode,
    ];

    /// Human-readable name
    pub fn label(&self) -> &'static str {
        match self {
            Setting::ReadMode => "Read Mode",
            Setting::BaudRate => "Baud Rate",
            Setting::LedMode => "LED Mode",
            Setting::LedBrightness => "LED Brightness",
            Setting::ColorMode => "Color Mode",
        }
    }

    /// Every value in this setting's domain
    pub fn domain(&self) -> Vec<SettingValue> {
        match self {
            Setting::ReadMode => ReadMode::ALL.iter().copied().map(SettingValue::ReadMode).collect(),
            Setting::BaudRate => BaudRate::ALL.iter().copied().map(SettingValue::BaudRate).collect(),
            Setting::LedMode => LedMode::ALL.iter().copied().map(SettingValue::LedMode).collect(),
            Setting::LedBrightness => LedBrightness::ALL
                .iter()
                .copied()
                .map(SettingValue::LedBrightness)
                .collect(),
            Setting::ColorMode => ColorMode::ALL.iter().copied().map(SettingValue::ColorMode).collect(),
        }
    }
}

impl fmt::Display for Setting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

/// When the scanner decodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReadMode {
    /// Scans continuously
    Continuous,
    /// Scans when an object is presented
    Induction,
}

impl ReadMode {
    /// Every read mode
    pub const ALL: [ReadMode; 2] = [ReadMode::Continuous, ReadMode::Induction];
}

/// Serial line speed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BaudRate {
    /// 1200 bps
    B1200,
    /// 4800 bps
    B4800,
    /// 9600 bps, the factory default
    B9600,
    /// 14400 bps
    B14400,
    /// 19200 bps
    B19200,
    /// 38400 bps
    B38400,
    /// 57600 bps
    B57600,
    /// 115200 bps
    B115200,
}

impl BaudRate {
    /// Every supported rate, slowest first
    pub const ALL: [BaudRate; 8] = [
        BaudRate::B1200,
        BaudRate::B4800,
        BaudRate::B9600,
        BaudRate::B14400,
        BaudRate::B19200,
        BaudRate::B38400,
        BaudRate::B57600,
        BaudRate::B115200,
    ];

    /// Bits per second
    pub fn bps(&self) -> u32 {
        match self {
            BaudRate::B1200 => 1200,
            BaudRate::B4800 => 4800,
            BaudRate::B9600 => 9600,
            BaudRate::B14400 => 14400,
            BaudRate::B19200 => 19200,
            BaudRate::B38400 => 38400,
            BaudRate::B57600 => 57600,
            BaudRate::B115200 => 115200,
        }
    }

    /// Look up a rate by bits per second
    pub fn from_bps(bps: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|b| b.bps() == bps)
    }
}

/// Illumination LED behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LedMode {
    /// Never lit
    Off,
    /// Lit while scanning
    Normal,
    /// Lit continuously
    AlwaysOn,
}

impl LedMode {
    /// Every LED mode
    pub const ALL: [LedMode; 3] = [LedMode::Off, LedMode::Normal, LedMode::AlwaysOn];
}

/// Illumination LED brightness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LedBrightness {
    /// Dimmest
    Low,
    /// Factory default
    Middle,
    /// Brightest
    High,
}

impl LedBrightness {
    /// Every brightness level
    pub const ALL: [LedBrightness; 3] = [LedBrightness::Low, LedBrightness::Middle, LedBrightness::High];
}

/// Which code polarity the decoder accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColorMode {
    /// Dark bars on a light background
    Normal,
    /// Light bars on a dark background
    Inverse,
    /// Either polarity
    Both,
}

impl ColorMode {
    /// Every color mode
    pub const ALL: [ColorMode; 3] = [ColorMode::Normal, ColorMode::Inverse, ColorMode::Both];
}

/// A value tagged with the kind of setting it belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SettingValue {
    /// Value for [`Setting::ReadMode`]
    ReadMode(ReadMode),
    /// Value for [`Setting::BaudRate`]
    BaudRate(BaudRate),
    /// Value for [`Setting::LedMode`]
    LedMode(LedMode),
    /// Value for [`Setting::LedBrightness`]
    LedBrightness(LedBrightness),
    /// Value for [`Setting::ColorMode`]
    ColorMode(ColorMode),
}

impl SettingValue {
    /// The setting this kind of value belongs to
    pub fn setting(&self) -> Setting {
        match self {
            SettingValue::ReadMode(_) => Setting::ReadMode,
            SettingValue::BaudRate(_) => Setting::BaudRate,
            SettingValue::LedMode(_) => Setting::LedMode,
            SettingValue::LedBrightness(_) => Setting::LedBrightness,
            SettingValue::ColorMode(_) => Setting::ColorMode,
        }
    }

    /// Label as shown in the configuration panel
    pub fn label(&self) -> String {
        match self {
            SettingValue::ReadMode(ReadMode::Continuous) => "Continuous Mode".into(),
            SettingValue::ReadMode(ReadMode::Induction) => "Induction Mode".into(),
            SettingValue::BaudRate(b) => b.bps().to_string(),
            SettingValue::LedMode(LedMode::Off) => "Off".into(),
            SettingValue::LedMode(LedMode::Normal) => "Normal".into(),
            SettingValue::LedMode(LedMode::AlwaysOn) => "Normally On".into(),
            SettingValue::LedBrightness(LedBrightness::Low) => "Low".into(),
            SettingValue::LedBrightness(LedBrightness::Middle) => "Middle".into(),
            SettingValue::LedBrightness(LedBrightness::High) => "High".into(),
            SettingValue::ColorMode(ColorMode::Normal) => "Normal".into(),
            SettingValue::ColorMode(ColorMode::Inverse) => "Inverse".into(),
            SettingValue::ColorMode(ColorMode::Both) => "Normal + Inverse".into(),
        }
    }

    /// Parse a panel label for the given setting.
    ///
    /// Matching is case-insensitive and ignores surrounding whitespace.
    pub fn parse(setting: Setting, label: &str) -> Result<Self, UnsupportedValueError> {
        let wanted = label.trim();
        setting
            .domain()
            .into_iter()
            .find(|v| v.label().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnsupportedValueError::new(setting, wanted))
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// What the device reported for one setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reading {
    /// A value in the setting's domain
    Known(SettingValue),
    /// No answer, a malformed answer, or a byte outside the table
    Unknown,
}

impl Reading {
    /// The value, if known
    pub fn value(&self) -> Option<SettingValue> {
        match self {
            Reading::Known(v) => Some(*v),
            Reading::Unknown => None,
        }
    }

    /// Whether the device reported a recognized value
    pub fn is_known(&self) -> bool {
        matches!(self, Reading::Known(_))
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reading::Known(v) => write!(f, "{}", v),
            Reading::Unknown => f.write_str("Unknown"),
        }
    }
}

/// Settings submitted together. Iteration follows [`Setting`] order.
pub type ConfigBatch = BTreeMap<Setting, SettingValue>;

/// Snapshot of the device's settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceState {
    readings: BTreeMap<Setting, Reading>,
}

impl DeviceState {
    /// An empty state (nothing read yet)
    pub fn new() -> Self {
        Self::default()
    }

    /// Reading for a setting; `Unknown` if it has never been read
    pub fn get(&self, setting: Setting) -> Reading {
        self.readings.get(&setting).copied().unwrap_or(Reading::Unknown)
    }

    /// Record a reading, replacing any earlier one
    pub fn insert(&mut self, setting: Setting, reading: Reading) {
        self.readings.insert(setting, reading);
    }

    /// Whether nothing has been read
    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// Number of settings read
    pub fn len(&self) -> usize {
        self.readings.len()
    }

    /// Readings in [`Setting`] order
    pub fn iter(&self) -> impl Iterator<Item = (Setting, Reading)> + '_ {
        self.readings.iter().map(|(s, r)| (*s, *r))
    }
}

impl FromIterator<(Setting, Reading)> for DeviceState {
    fn from_iter<I: IntoIterator<Item = (Setting, Reading)>>(iter: I) -> Self {
        Self {
            readings: iter.into_iter().collect(),
        }
    }
}
