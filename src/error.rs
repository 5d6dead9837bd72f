// src/error.rs
//! Error types for the GPS reader

use std::fmt;

pub type Result<T> = std::result::Result<T, GpsError>;

#[derive(Debug)]
pub enum GpsError {
    Io(std::io::Error),
    Json(serde_json::Error),
    /// The gpsd session could not be established
    Connection(String),
    /// The gpsd session failed mid-stream
    SessionRead(String),
    SinkOpen { sink: String, source: std::io::Error },
    SinkWrite { sink: String, source: std::io::Error },
    Config(String),
    Other(String),
}

impl GpsError {
    /// Whether the error only affects a single sink for the current cycle
    pub fn is_sink_error(&self) -> bool {
        matches!(self, GpsError::SinkOpen { .. } | GpsError::SinkWrite { .. })
    }
}

impl fmt::Display for GpsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpsError::Io(e) => write!(f, "IO error: {}", e),
            GpsError::Json(e) => write!(f, "JSON error: {}", e),
            GpsError::Connection(msg) => write!(f, "Connection error: {}", msg),
            GpsError::SessionRead(msg) => write!(f, "Read error: {}", msg),
            GpsError::SinkOpen { sink, source } => {
                write!(f, "Cannot open sink {}: {}", sink, source)
            }
            GpsError::SinkWrite { sink, source } => {
                write!(f, "Cannot write to sink {}: {}", sink, source)
            }
            GpsError::Config(msg) => write!(f, "Configuration error: {}", msg),
            GpsError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for GpsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GpsError::Io(e) => Some(e),
            GpsError::Json(e) => Some(e),
            GpsError::SinkOpen { source, .. } | GpsError::SinkWrite { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<std::io::Error> for GpsError {
    fn from(error: std::io::Error) -> Self {
        GpsError::Io(error)
    }
}

impl From<serde_json::Error> for GpsError {
    fn from(error: serde_json::Error) -> Self {
        GpsError::Json(error)
    }
}

impl From<anyhow::Error> for GpsError {
    fn from(error: anyhow::Error) -> Self {
        GpsError::Other(error.to_string())
    }
}
