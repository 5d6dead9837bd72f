// src/sink/format.rs
//! Text record rendering
//!
//! `[mode],[mode_id],[date],[time],[lat],[lon],[speed],[track],[sat_used],[sat_visible]`

use crate::gps::{Fix, FixMode, OverrideRecord};
use chrono::{DateTime, Local};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d,%H:%M:%S";

/// Placeholder telemetry for manually asserted positions
const MANUAL_TELEMETRY: &str = "0.0,233,19,0";

pub fn format_timestamp(timestamp: &DateTime<Local>) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

/// Render a live fix as one newline-terminated record
pub fn format_fix(fix: &Fix) -> String {
    let mode = fix.mode;
    match fix.position() {
        Some((lat, lon)) => {
            let timestamp = fix.timestamp.as_ref().map(format_timestamp).unwrap_or_default();
            format!(
                "{},{},{},{:.8},{:.8},{:.1},{:.0},{},{} \n",
                mode.name(),
                mode.id(),
                timestamp,
                lat,
                lon,
                fix.speed,
                fix.track,
                fix.satellites_used,
                fix.satellites_visible
            )
        }
        None => format!("{},{},-,-,-,-,-,-,- \n", mode.name(), mode.id()),
    }
}

/// Render a manual override as one newline-terminated record
pub fn format_manual(record: &OverrideRecord) -> String {
    format!(
        "{},{},{},{},{}\n",
        FixMode::Manual.name(),
        FixMode::Manual.id(),
        format_timestamp(&record.captured_at),
        record.raw_location,
        MANUAL_TELEMETRY
    )
}
