// src/sink/fifo.rs
//! Named pipe sink
//!
//! Each record is delivered with a fresh open/write/close so readers may
//! attach and detach at will. The open is non-blocking: a FIFO with no
//! reader fails immediately instead of stalling the caller.

use super::RecordSink;
use crate::error::{GpsError, Result};
use std::{
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
};

#[derive(Debug, Clone)]
pub struct FifoSink {
    name: String,
    path: PathBuf,
}

impl FifoSink {
    pub fn new(name: &str, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.to_string(),
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open_options() -> OpenOptions {
        let mut options = OpenOptions::new();
        options.write(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.custom_flags(libc::O_NONBLOCK);
        }
        options
    }
}

impl RecordSink for FifoSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn write_record(&self, record: &str) -> Result<()> {
        let mut file = Self::open_options()
            .open(&self.path)
            .map_err(|source| GpsError::SinkOpen {
                sink: format!("{} ({})", self.name, self.path.display()),
                source,
            })?;

        file.write_all(record.as_bytes())
            .map_err(|source| GpsError::SinkWrite {
                sink: format!("{} ({})", self.name, self.path.display()),
                source,
            })
    }
}

/// Create a FIFO at `path` unless something already exists there.
///
/// Returns whether a new FIFO was created.
#[cfg(unix)]
pub fn ensure_fifo(path: &Path) -> Result<bool> {
    use std::{ffi::CString, os::unix::ffi::OsStrExt};

    if path.exists() {
        return Ok(false);
    }

    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|e| GpsError::Other(format!("Invalid FIFO path {}: {}", path.display(), e)))?;

    // SAFETY: c_path is a valid NUL-terminated string that outlives the call
    let rc = unsafe { libc::mkfifo(c_path.as_ptr(), 0o666) };
    if rc != 0 {
        return Err(GpsError::Io(std::io::Error::last_os_error()));
    }
    Ok(true)
}

#[cfg(not(unix))]
pub fn ensure_fifo(path: &Path) -> Result<bool> {
    Err(GpsError::Other(format!(
        "Cannot create FIFO {}: named pipes require a unix platform",
        path.display()
    )))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::{
        fs::File,
        io::{ErrorKind, Read},
        os::unix::fs::{FileTypeExt, OpenOptionsExt},
    };

    fn open_reader(path: &Path) -> File {
        OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(path)
            .unwrap()
    }

    #[test]
    fn test_ensure_fifo_creates_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gpssocket");

        assert!(ensure_fifo(&path).unwrap());
        assert!(std::fs::metadata(&path).unwrap().file_type().is_fifo());
        assert!(!ensure_fifo(&path).unwrap());
    }

    #[test]
    fn test_ensure_fifo_leaves_regular_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gpssocket");
        std::fs::write(&path, "old").unwrap();

        assert!(!ensure_fifo(&path).unwrap());
        assert!(std::fs::metadata(&path).unwrap().is_file());
    }

    #[test]
    fn test_fifo_without_reader_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gpssocket");
        ensure_fifo(&path).unwrap();

        let sink = FifoSink::new("ui", &path);
        match sink.write_record("3D,3 \n") {
            Err(GpsError::SinkOpen { source, .. }) => {
                assert_eq!(source.raw_os_error(), Some(libc::ENXIO))
            }
            other => panic!("expected SinkOpen, got {:?}", other),
        }
    }

    #[test]
    fn test_fifo_with_reader_receives_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gpssocket");
        ensure_fifo(&path).unwrap();
        let mut reader = open_reader(&path);

        FifoSink::new("ui", &path).write_record("3D,3,-,-,-,-,-,-,- \n").unwrap();

        let mut received = String::new();
        match reader.read_to_string(&mut received) {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::WouldBlock => {}
            Err(e) => panic!("read failed: {}", e),
        }
        assert_eq!(received, "3D,3,-,-,-,-,-,-,- \n");
    }

    #[test]
    fn test_regular_file_is_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gpssocket");
        std::fs::write(&path, "a much longer previous record\n").unwrap();

        FifoSink::new("mesh", &path).write_record("short\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "short\n");
    }

    #[test]
    fn test_missing_sink_is_open_error() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FifoSink::new("mesh", dir.path().join("absent"));
        assert!(matches!(
            sink.write_record("x\n"),
            Err(GpsError::SinkOpen { .. })
        ));
    }
}
