// src/arbiter.rs
//! Live/manual mode arbitration
//!
//! The outer loop checks for the override file on every pass. Without it
//! the arbiter opens a gpsd session and stays in the live loop until the
//! session fails or the override file appears; with it the arbiter reads
//! the override and publishes a manual record.

use crate::{
    config::ReaderConfig,
    error::Result,
    gps::{
        gpsd::{LiveFix, LiveSession},
        manual::{override_present, read_override},
    },
    sink::{
        fifo::ensure_fifo,
        format::{format_fix, format_manual},
        DualSinkPublisher,
    },
    throttle::ThrottleState,
};
use std::fmt;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Live,
    Manual,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Live => write!(f, "live"),
            Mode::Manual => write!(f, "manual"),
        }
    }
}

/// Why a live session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveExit {
    OverrideDetected,
    ReadFailed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    /// Live fixes and manual reads that went through the throttle
    pub acquisitions: u64,
    /// Live cycles that timed out or carried no mode
    pub discarded: u64,
    pub publishes: u64,
}

pub struct ModeArbiter {
    config: ReaderConfig,
    publisher: DualSinkPublisher,
    throttle: ThrottleState,
    mode: Option<Mode>,
    stats: CycleStats,
}

impl ModeArbiter {
    pub fn new(config: ReaderConfig) -> Self {
        let publisher = DualSinkPublisher::from_config(&config);
        Self::with_publisher(config, publisher)
    }

    pub fn with_publisher(config: ReaderConfig, publisher: DualSinkPublisher) -> Self {
        Self {
            config,
            publisher,
            throttle: ThrottleState::new(),
            mode: None,
            stats: CycleStats::default(),
        }
    }

    pub fn mode(&self) -> Option<Mode> {
        self.mode
    }

    pub fn stats(&self) -> CycleStats {
        self.stats
    }

    pub fn throttle(&self) -> &ThrottleState {
        &self.throttle
    }

    /// Create missing sink FIFOs when configured to
    pub fn provision_sinks(&self) {
        if !self.config.create_fifos {
            return;
        }
        for path in [&self.config.ui_sink_path, &self.config.mesh_sink_path] {
            match ensure_fifo(path) {
                Ok(true) => info!("Created FIFO {}", path.display()),
                Ok(false) => debug!("Sink {} already exists", path.display()),
                Err(e) => warn!("Cannot create FIFO {}: {}", path.display(), e),
            }
        }
    }

    /// Run until the process is terminated or gpsd cannot be reached
    pub async fn run(&mut self) -> Result<()> {
        loop {
            self.run_once().await?;
        }
    }

    /// One pass of the outer loop.
    ///
    /// Only a failed gpsd connect is returned as an error.
    pub async fn run_once(&mut self) -> Result<()> {
        if override_present(&self.config.override_path) {
            self.run_manual_pass().await;
            sleep(self.config.loop_interval()).await;
            return Ok(());
        }

        let session = self.connect_live().await?;
        match self.run_live_session(session).await {
            LiveExit::OverrideDetected => info!("Override file detected, leaving live mode"),
            LiveExit::ReadFailed => info!("Live session ended, reconnecting"),
        }
        Ok(())
    }

    /// Enter live mode and open a gpsd session
    pub async fn connect_live(&mut self) -> Result<LiveSession> {
        self.enter(Mode::Live);
        info!("Connecting to gpsd at {}...", self.config.gpsd_address());
        let session = LiveSession::connect(
            &self.config.gpsd_host,
            self.config.gpsd_port,
            self.config.read_timeout(),
        )
        .await?;
        info!("Connected successfully!");
        self.throttle.reset();
        Ok(session)
    }

    /// Drive the live loop until the session fails or the override file appears.
    ///
    /// The session is closed before returning in both cases.
    pub async fn run_live_session(&mut self, mut session: LiveSession) -> LiveExit {
        let before = self.stats;
        let exit = loop {
            match session.next_fix().await {
                Ok(Some(live)) => self.handle_live_fix(&live),
                Ok(None) => self.stats.discarded += 1,
                Err(e) => {
                    error!("{}", e);
                    break LiveExit::ReadFailed;
                }
            }

            if override_present(&self.config.override_path) {
                break LiveExit::OverrideDetected;
            }
        };

        session.close().await;
        info!(
            "gpsd session closed: {} fixes, {} idle cycles, {} publishes",
            self.stats.acquisitions - before.acquisitions,
            self.stats.discarded - before.discarded,
            self.stats.publishes - before.publishes
        );
        exit
    }

    fn handle_live_fix(&mut self, live: &LiveFix) {
        self.stats.acquisitions += 1;
        let due = self.throttle.record(
            self.config.live_threshold,
            live.time_updated,
            live.position_updated(),
        );
        if due {
            self.publish(&format_fix(&live.fix));
        }
    }

    /// Read the override file and publish it when the throttle allows
    pub async fn run_manual_pass(&mut self) {
        self.enter(Mode::Manual);

        // The file may have been removed since the presence check
        let Some(record) = read_override(&self.config.override_path) else {
            return;
        };

        self.stats.acquisitions += 1;
        if self.throttle.record(self.config.manual_threshold, true, true) {
            self.publish(&format_manual(&record));
        }
        sleep(self.config.manual_interval()).await;
    }

    fn publish(&mut self, record: &str) {
        let outcome = self.publisher.publish(record);
        if outcome.delivered() > 0 {
            self.stats.publishes += 1;
        }
    }

    fn enter(&mut self, mode: Mode) {
        if self.mode != Some(mode) {
            info!("Entering {} mode", mode);
            self.mode = Some(mode);
            self.throttle.reset();
        }
    }
}
