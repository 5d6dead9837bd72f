// src/config.rs
//! Configuration management backed by a JSON file

use crate::error::{GpsError, Result};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    pub gpsd_host: String,
    pub gpsd_port: u16,
    /// Presence of this file switches the reader into manual mode
    pub override_path: PathBuf,
    pub ui_sink_path: PathBuf,
    pub mesh_sink_path: PathBuf,
    pub read_timeout_ms: u64,
    pub live_threshold: u32,
    pub manual_threshold: u32,
    pub manual_interval_ms: u64,
    pub loop_interval_ms: u64,
    pub create_fifos: bool,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            gpsd_host: "localhost".to_string(),
            gpsd_port: 2947,
            override_path: PathBuf::from("/var/lib/gps-reader/manual-location"),
            ui_sink_path: PathBuf::from("/tmp/gpssocket"),
            mesh_sink_path: PathBuf::from("/tmp/meshgpssocket"),
            read_timeout_ms: 5000,
            live_threshold: 20,
            manual_threshold: 5,
            manual_interval_ms: 2000,
            loop_interval_ms: 1000,
            create_fifos: true,
        }
    }
}

impl ReaderConfig {
    /// Load configuration from `path`, falling back to defaults when the file is absent
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)
            .map_err(|e| GpsError::Config(format!("Failed to read {}: {}", path.display(), e)))?;

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| GpsError::Config(format!("Failed to parse {}: {}", path.display(), e)))?;

        Ok(config)
    }

    /// Save configuration to `path` as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                GpsError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let contents = serde_json::to_string_pretty(self)?;

        std::fs::write(path, contents)
            .map_err(|e| GpsError::Config(format!("Failed to write {}: {}", path.display(), e)))?;

        Ok(())
    }

    /// `$HOME/.config/gps-reader/config.json`
    pub fn default_path() -> Result<PathBuf> {
        Self::path_under_home(std::env::var_os("HOME"))
            .ok_or_else(|| GpsError::Config("HOME environment variable not set".to_string()))
    }

    /// The explicit path if given, else the default path when `HOME` is set
    pub fn resolve_path(explicit: Option<&Path>) -> Option<PathBuf> {
        match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => Self::path_under_home(std::env::var_os("HOME")),
        }
    }

    fn path_under_home(home: Option<OsString>) -> Option<PathBuf> {
        home.filter(|h| !h.is_empty()).map(|home| {
            PathBuf::from(home)
                .join(".config")
                .join("gps-reader")
                .join("config.json")
        })
    }

    /// Load from `path`, or use defaults when there is no config path at all
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.gpsd_host.is_empty() {
            return Err(GpsError::Config("gpsd host is empty".to_string()));
        }
        if self.gpsd_port == 0 {
            return Err(GpsError::Config("gpsd port must be non-zero".to_string()));
        }
        for (name, path) in [
            ("override", &self.override_path),
            ("ui sink", &self.ui_sink_path),
            ("mesh sink", &self.mesh_sink_path),
        ] {
            if path.as_os_str().is_empty() {
                return Err(GpsError::Config(format!("{} path is empty", name)));
            }
        }
        if self.ui_sink_path == self.mesh_sink_path {
            return Err(GpsError::Config(format!(
                "ui and mesh sinks share the same path {}",
                self.ui_sink_path.display()
            )));
        }
        if self.read_timeout_ms == 0 {
            return Err(GpsError::Config("read timeout must be non-zero".to_string()));
        }
        Ok(())
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn manual_interval(&self) -> Duration {
        Duration::from_millis(self.manual_interval_ms)
    }

    pub fn loop_interval(&self) -> Duration {
        Duration::from_millis(self.loop_interval_ms)
    }

    pub fn gpsd_address(&self) -> String {
        format!("{}:{}", self.gpsd_host, self.gpsd_port)
    }
}
