// src/gps/manual.rs
//! Manual location override file

use super::data::OverrideRecord;
use chrono::Local;
use std::{
    fs::File,
    io::{BufRead, BufReader, ErrorKind},
    path::Path,
};
use tracing::warn;

/// Whether an override file currently exists at `path`
pub fn override_present(path: &Path) -> bool {
    path.exists()
}

/// Read the first line of the override file.
///
/// Returns `None` when the file does not exist. A file that exists but
/// cannot be read, or is empty, still yields a record with empty location
/// text.
pub fn read_override(path: &Path) -> Option<OverrideRecord> {
    let file = match File::open(path) {
        Ok(file) => Some(file),
        Err(e) if e.kind() == ErrorKind::NotFound => return None,
        Err(e) => {
            warn!("Cannot open override file {}: {}", path.display(), e);
            None
        }
    };

    let mut line = String::new();
    if let Some(file) = file {
        match BufReader::new(file).read_line(&mut line) {
            Ok(0) => warn!("Override file {} is empty", path.display()),
            Ok(_) => {}
            Err(e) => {
                warn!("Cannot read override file {}: {}", path.display(), e);
                line.clear();
            }
        }
    }

    Some(OverrideRecord {
        raw_location: strip_line_ending(&line).to_string(),
        captured_at: Local::now(),
    })
}

fn strip_line_ending(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}
