// src/sink/mod.rs
//! Output side: record formatting and delivery to the downstream sinks

pub mod fifo;
pub mod format;

use crate::{config::ReaderConfig, error::Result};
use fifo::FifoSink;
use tracing::{debug, warn};

/// A downstream consumer of formatted records
pub trait RecordSink: Send + Sync {
    fn name(&self) -> &str;

    /// Deliver one record; errors only concern this sink
    fn write_record(&self, record: &str) -> Result<()>;
}

/// Which sinks received a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishOutcome {
    pub ui: bool,
    pub mesh: bool,
}

impl PublishOutcome {
    pub fn delivered(&self) -> usize {
        usize::from(self.ui) + usize::from(self.mesh)
    }
}

/// Writes every record to the UI sink and the mesh sink independently
pub struct DualSinkPublisher {
    ui: Box<dyn RecordSink>,
    mesh: Box<dyn RecordSink>,
}

impl DualSinkPublisher {
    pub fn new(ui: Box<dyn RecordSink>, mesh: Box<dyn RecordSink>) -> Self {
        Self { ui, mesh }
    }

    pub fn from_config(config: &ReaderConfig) -> Self {
        Self::new(
            Box::new(FifoSink::new("ui", &config.ui_sink_path)),
            Box::new(FifoSink::new("mesh", &config.mesh_sink_path)),
        )
    }

    /// Write `record` to both sinks. A failing sink is logged and skipped.
    pub fn publish(&self, record: &str) -> PublishOutcome {
        let outcome = PublishOutcome {
            ui: Self::deliver(self.ui.as_ref(), record),
            mesh: Self::deliver(self.mesh.as_ref(), record),
        };
        debug!("Published {:?} to {} sink(s)", record.trim_end(), outcome.delivered());
        outcome
    }

    fn deliver(sink: &dyn RecordSink, record: &str) -> bool {
        match sink.write_record(record) {
            Ok(()) => true,
            Err(e) => {
                warn!("Skipping {} sink this cycle: {}", sink.name(), e);
                false
            }
        }
    }
}
