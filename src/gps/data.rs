// src/gps/data.rs
//! Fix data structures

use chrono::{DateTime, Local};

/// Fix mode as reported by gpsd, plus the manual override pseudo-mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FixMode {
    #[default]
    Unknown,
    NoFix,
    Fix2D,
    Fix3D,
    Manual,
}

impl FixMode {
    const NAMES: [&'static str; 5] = ["n/a", "None", "2D", "3D", "Manual"];

    /// Map a raw mode value, clamping anything out of range to `Unknown`
    pub fn from_raw(raw: i64) -> Self {
        match raw {
            1 => FixMode::NoFix,
            2 => FixMode::Fix2D,
            3 => FixMode::Fix3D,
            4 => FixMode::Manual,
            _ => FixMode::Unknown,
        }
    }

    pub fn id(self) -> u8 {
        match self {
            FixMode::Unknown => 0,
            FixMode::NoFix => 1,
            FixMode::Fix2D => 2,
            FixMode::Fix3D => 3,
            FixMode::Manual => 4,
        }
    }

    pub fn name(self) -> &'static str {
        Self::NAMES[self.id() as usize]
    }
}

/// One positional sample acquired from gpsd
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fix {
    pub mode: FixMode,
    pub timestamp: Option<DateTime<Local>>,
    position: Option<(f64, f64)>,
    pub speed: f64,
    pub track: f64,
    pub satellites_used: u32,
    pub satellites_visible: u32,
}

impl Fix {
    pub fn new(mode: FixMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// Set latitude/longitude; the pair is kept only when both values are present and finite
    pub fn set_position(&mut self, latitude: Option<f64>, longitude: Option<f64>) {
        self.position = match (latitude, longitude) {
            (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => Some((lat, lon)),
            _ => None,
        };
    }

    pub fn with_position(mut self, latitude: f64, longitude: f64) -> Self {
        self.set_position(Some(latitude), Some(longitude));
        self
    }

    pub fn position(&self) -> Option<(f64, f64)> {
        self.position
    }

    pub fn has_position(&self) -> bool {
        self.position.is_some()
    }
}

/// One line read from the manual override file
#[derive(Debug, Clone, PartialEq)]
pub struct OverrideRecord {
    /// Location text, embedded verbatim in the output record
    pub raw_location: String,
    pub captured_at: DateTime<Local>,
}
