// src/lib.rs
//! GPS Reader Library
//!
//! Reads fixes from gpsd, or from a manual override file while one exists,
//! and republishes the latest fix as a text record to a UI sink and a mesh
//! sink.

pub mod arbiter;
pub mod config;
pub mod error;
pub mod gps;
pub mod sink;
pub mod throttle;

// Re-export main types for convenience
pub use arbiter::{LiveExit, Mode, ModeArbiter};
pub use config::ReaderConfig;
pub use error::{GpsError, Result};
pub use gps::{Fix, FixMode, OverrideRecord};
pub use sink::{DualSinkPublisher, RecordSink};
