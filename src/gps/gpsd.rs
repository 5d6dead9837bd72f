// src/gps/gpsd.rs
//! GPSD client session
//!
//! Speaks the gpsd JSON protocol over TCP: enables watch mode on connect,
//! then turns each TPV report into a [`Fix`] while tracking satellite
//! counts from SKY reports.

use super::data::{Fix, FixMode};
use crate::error::{GpsError, Result};
use bytes::{BufMut, BytesMut};
use chrono::{DateTime, Local, TimeZone};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use std::{io, time::Duration};
use tokio::{io::AsyncWriteExt, net::TcpStream, time::timeout};
use tokio_util::codec::{Decoder, Encoder, Framed};
use tracing::{debug, info, trace, warn};

pub const ENABLE_WATCH_CMD: &str = r#"?WATCH={"enable":true,"json":true}"#;
pub const DISABLE_WATCH_CMD: &str = r#"?WATCH={"enable":false}"#;

const MAX_LINE_LENGTH: usize = 64 * 1024;

#[derive(Debug, Deserialize)]
#[serde(tag = "class")]
enum GpsdMessage {
    #[serde(rename = "TPV")]
    Tpv(Tpv),
    #[serde(rename = "SKY")]
    Sky(Sky),
    #[serde(rename = "VERSION")]
    Version(Version),
    #[serde(rename = "DEVICES")]
    Devices(Devices),
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct Tpv {
    mode: Option<i64>,
    // ISO 8601 string on current gpsd, seconds since the epoch on old releases
    time: Option<serde_json::Value>,
    lat: Option<f64>,
    lon: Option<f64>,
    speed: Option<f64>,
    track: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Sky {
    #[serde(rename = "uSat")]
    used: Option<u32>,
    #[serde(rename = "nSat")]
    visible: Option<u32>,
    satellites: Option<Vec<Satellite>>,
}

#[derive(Debug, Deserialize)]
struct Satellite {
    #[serde(default)]
    used: bool,
}

#[derive(Debug, Deserialize)]
struct Version {
    release: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Devices {
    #[serde(default)]
    devices: Vec<Device>,
}

#[derive(Debug, Deserialize)]
struct Device {
    path: Option<String>,
}

/// A fix together with the flags describing what this cycle captured
#[derive(Debug, Clone, PartialEq)]
pub struct LiveFix {
    pub fix: Fix,
    /// gpsd reported a time in this message
    pub time_updated: bool,
}

impl LiveFix {
    pub fn position_updated(&self) -> bool {
        self.fix.has_position()
    }
}

/// Per-session state carried between gpsd messages
#[derive(Debug, Default)]
pub struct GpsdState {
    last_timestamp: Option<DateTime<Local>>,
    satellites_used: u32,
    satellites_visible: u32,
}

impl GpsdState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process one line of gpsd JSON.
    ///
    /// Returns a fix only for TPV reports that carry a mode; every other
    /// line (SKY, notices, garbage) only updates session state.
    pub fn process_line(&mut self, line: &str) -> Option<LiveFix> {
        self.process_bytes(line.as_bytes())
    }

    /// Same as [`process_line`](Self::process_line) for a raw line; invalid
    /// UTF-8 is discarded like any other undecodable input.
    pub fn process_bytes(&mut self, line: &[u8]) -> Option<LiveFix> {
        let msg: GpsdMessage = match serde_json::from_slice(line) {
            Ok(msg) => msg,
            Err(e) => {
                trace!("Discarding undecodable gpsd line: {}", e);
                return None;
            }
        };

        match msg {
            GpsdMessage::Tpv(tpv) => self.process_tpv(tpv),
            GpsdMessage::Sky(sky) => {
                self.process_sky(sky);
                None
            }
            GpsdMessage::Version(version) => {
                if let Some(release) = version.release {
                    info!("Connected to gpsd version: {}", release);
                }
                None
            }
            GpsdMessage::Devices(devices) => {
                info!("gpsd managing {} device(s)", devices.devices.len());
                for path in devices.devices.iter().filter_map(|d| d.path.as_deref()) {
                    debug!("  Device: {}", path);
                }
                None
            }
            GpsdMessage::Other => None,
        }
    }

    fn process_tpv(&mut self, tpv: Tpv) -> Option<LiveFix> {
        let Some(raw_mode) = tpv.mode else {
            trace!("Discarding TPV without mode");
            return None;
        };

        let timestamp = tpv.time.as_ref().and_then(parse_time);
        let time_updated = timestamp.is_some();
        if timestamp.is_some() {
            self.last_timestamp = timestamp;
        }

        let mut fix = Fix::new(FixMode::from_raw(raw_mode));
        fix.timestamp = self.last_timestamp;
        fix.set_position(tpv.lat, tpv.lon);
        fix.speed = tpv.speed.unwrap_or(0.0);
        fix.track = tpv.track.unwrap_or(0.0);
        fix.satellites_used = self.satellites_used;
        fix.satellites_visible = self.satellites_visible;

        Some(LiveFix { fix, time_updated })
    }

    fn process_sky(&mut self, sky: Sky) {
        let counted = sky
            .satellites
            .as_ref()
            .map(|sats| (sats.iter().filter(|s| s.used).count() as u32, sats.len() as u32));

        // SKY without satellite data only carries DOPs
        if let (Some(used), Some(visible)) = (
            sky.used.or(counted.map(|c| c.0)),
            sky.visible.or(counted.map(|c| c.1)),
        ) {
            self.satellites_used = used;
            self.satellites_visible = visible;
        }
    }
}

fn parse_time(value: &serde_json::Value) -> Option<DateTime<Local>> {
    match value {
        serde_json::Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|t| t.with_timezone(&Local))
            .ok(),
        serde_json::Value::Number(n) => {
            let secs = n.as_f64()?;
            Local.timestamp_opt(secs.trunc() as i64, 0).single()
        }
        _ => None,
    }
}

/// Newline framing for the gpsd stream.
///
/// Yields raw lines and never fails on content, so one bad line cannot end
/// the stream. Lines longer than `MAX_LINE_LENGTH` are dropped.
#[derive(Debug, Default)]
pub struct GpsdLineCodec {
    next_index: usize,
    discarding: bool,
}

impl GpsdLineCodec {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for GpsdLineCodec {
    type Item = Vec<u8>;
    type Error = io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> io::Result<Option<Vec<u8>>> {
        loop {
            match buf[self.next_index..].iter().position(|b| *b == b'\n') {
                Some(offset) => {
                    let line = buf.split_to(self.next_index + offset + 1);
                    self.next_index = 0;
                    if std::mem::take(&mut self.discarding) {
                        trace!("Discarded gpsd line longer than {} bytes", MAX_LINE_LENGTH);
                        continue;
                    }
                    let mut line = &line[..line.len() - 1];
                    if let Some(stripped) = line.strip_suffix(b"\r") {
                        line = stripped;
                    }
                    return Ok(Some(line.to_vec()));
                }
                None if buf.len() > MAX_LINE_LENGTH => {
                    buf.clear();
                    self.next_index = 0;
                    self.discarding = true;
                    return Ok(None);
                }
                None => {
                    self.next_index = buf.len();
                    return Ok(None);
                }
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> io::Result<Option<Vec<u8>>> {
        let line = self.decode(buf)?;
        if line.is_none() && !buf.is_empty() {
            trace!("Dropping {} bytes of unterminated gpsd data", buf.len());
            buf.clear();
            self.next_index = 0;
        }
        Ok(line)
    }
}

impl<'a> Encoder<&'a str> for GpsdLineCodec {
    type Error = io::Error;

    fn encode(&mut self, line: &'a str, dst: &mut BytesMut) -> io::Result<()> {
        dst.reserve(line.len() + 1);
        dst.put_slice(line.as_bytes());
        dst.put_u8(b'\n');
        Ok(())
    }
}

/// An open gpsd watch session
pub struct LiveSession {
    framed: Framed<TcpStream, GpsdLineCodec>,
    state: GpsdState,
    read_timeout: Duration,
}

impl LiveSession {
    /// Connect to gpsd and enable JSON streaming
    pub async fn connect(host: &str, port: u16, read_timeout: Duration) -> Result<Self> {
        let stream = TcpStream::connect(format!("{}:{}", host, port))
            .await
            .map_err(|e| {
                GpsError::Connection(format!("Failed to connect to gpsd at {}:{}: {}", host, port, e))
            })?;

        let mut framed = Framed::new(stream, GpsdLineCodec::new());
        framed
            .send(ENABLE_WATCH_CMD)
            .await
            .map_err(|e| GpsError::Connection(format!("Failed to send WATCH command: {}", e)))?;

        Ok(Self {
            framed,
            state: GpsdState::new(),
            read_timeout,
        })
    }

    /// Wait for the next gpsd message.
    ///
    /// `Ok(None)` means nothing usable arrived this cycle: either the wait
    /// timed out or the message carried no mode. Errors mean the session is dead.
    pub async fn next_fix(&mut self) -> Result<Option<LiveFix>> {
        let line = match timeout(self.read_timeout, self.framed.next()).await {
            Err(_) => {
                debug!("No gpsd data within {:?}", self.read_timeout);
                return Ok(None);
            }
            Ok(None) => {
                return Err(GpsError::SessionRead("gpsd closed the connection".to_string()))
            }
            Ok(Some(Err(e))) => return Err(GpsError::SessionRead(e.to_string())),
            Ok(Some(Ok(line))) => line,
        };

        Ok(self.state.process_bytes(&line))
    }

    /// Disable streaming and close the connection
    pub async fn close(mut self) {
        if let Err(e) = self.framed.send(DISABLE_WATCH_CMD).await {
            debug!("Failed to send WATCH disable: {}", e);
        }
        let mut stream = self.framed.into_inner();
        if let Err(e) = stream.shutdown().await {
            warn!("Error closing gpsd connection: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TPV: &str = r#"{"class":"TPV","device":"/dev/ttyUSB0","mode":3,"time":"2024-05-01T12:00:00.000Z","ept":0.005,"lat":60.169526,"lon":24.934545,"alt":12.4,"track":87.2,"speed":1.23}"#;
    const SKY: &str = r#"{"class":"SKY","device":"/dev/ttyUSB0","hdop":1.2,"satellites":[{"PRN":1,"ss":42,"used":true},{"PRN":2,"ss":38,"used":true},{"PRN":3,"ss":12,"used":false}]}"#;

    #[test]
    fn test_tpv_parsing() {
        let mut state = GpsdState::new();
        let live = state.process_line(TPV).unwrap();

        assert_eq!(live.fix.mode, FixMode::Fix3D);
        assert_eq!(live.fix.position(), Some((60.169526, 24.934545)));
        assert_eq!(live.fix.speed, 1.23);
        assert_eq!(live.fix.track, 87.2);
        assert!(live.time_updated);
        assert!(live.position_updated());

        let expected = DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Local);
        assert_eq!(live.fix.timestamp, Some(expected));
    }

    #[test]
    fn test_tpv_without_mode_is_discarded() {
        let mut state = GpsdState::new();
        let line = r#"{"class":"TPV","time":"2024-05-01T12:00:00.000Z","lat":60.1,"lon":24.9}"#;
        assert!(state.process_line(line).is_none());
    }

    #[test]
    fn test_out_of_range_mode_clamped() {
        let mut state = GpsdState::new();
        let live = state.process_line(r#"{"class":"TPV","mode":9}"#).unwrap();
        assert_eq!(live.fix.mode, FixMode::Unknown);
        assert!(!live.time_updated);
        assert!(!live.position_updated());
    }

    #[test]
    fn test_sky_counts_carry_into_fix() {
        let mut state = GpsdState::new();
        assert!(state.process_line(SKY).is_none());

        let live = state.process_line(TPV).unwrap();
        assert_eq!(live.fix.satellites_used, 2);
        assert_eq!(live.fix.satellites_visible, 3);
    }

    #[test]
    fn test_sky_summary_counts_preferred() {
        let mut state = GpsdState::new();
        state.process_line(r#"{"class":"SKY","uSat":9,"nSat":14,"satellites":[]}"#);

        let live = state.process_line(TPV).unwrap();
        assert_eq!(live.fix.satellites_used, 9);
        assert_eq!(live.fix.satellites_visible, 14);
    }

    #[test]
    fn test_timestamp_sticks_until_updated() {
        let mut state = GpsdState::new();
        state.process_line(TPV).unwrap();

        let live = state
            .process_line(r#"{"class":"TPV","mode":2,"lat":60.2,"lon":24.9}"#)
            .unwrap();
        assert!(!live.time_updated);
        assert!(live.fix.timestamp.is_some());
    }

    #[test]
    fn test_epoch_time_accepted() {
        let mut state = GpsdState::new();
        let live = state
            .process_line(r#"{"class":"TPV","mode":3,"time":1714564800.5}"#)
            .unwrap();
        assert!(live.time_updated);
        assert_eq!(live.fix.timestamp.unwrap().timestamp(), 1_714_564_800);
    }

    #[test]
    fn test_invalid_utf8_is_discarded() {
        let mut state = GpsdState::new();
        assert!(state
            .process_bytes(b"{\"class\":\"DEVICE\",\"path\":\"/dev/\xff\xfe\"}")
            .is_none());
        assert!(state.process_bytes(TPV.as_bytes()).is_some());
    }

    #[test]
    fn test_codec_splits_lines() {
        let mut codec = GpsdLineCodec::new();
        let mut buf = BytesMut::from(&b"first\r\nsec"[..]);
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(b"first".to_vec()));
        assert_eq!(codec.decode(&mut buf).unwrap(), None);

        buf.extend_from_slice(b"ond\n");
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(b"second".to_vec()));
    }

    #[test]
    fn test_codec_passes_invalid_utf8_through() {
        let mut codec = GpsdLineCodec::new();
        let mut buf = BytesMut::from(&b"\xff\xfe\n{}\n"[..]);
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(vec![0xff, 0xfe]));
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(b"{}".to_vec()));
    }

    #[test]
    fn test_codec_drops_overlong_line() {
        let mut codec = GpsdLineCodec::new();
        let mut buf = BytesMut::from(vec![b'x'; MAX_LINE_LENGTH + 1].as_slice());
        assert_eq!(codec.decode(&mut buf).unwrap(), None);

        buf.extend_from_slice(b"xxxx\nnext\n");
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(b"next".to_vec()));
    }

    #[test]
    fn test_codec_drops_unterminated_tail_at_eof() {
        let mut codec = GpsdLineCodec::new();
        let mut buf = BytesMut::from(&b"{\"class\":\"TPV\""[..]);
        assert_eq!(codec.decode_eof(&mut buf).unwrap(), None);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_invalid_json() {
        let mut state = GpsdState::new();
        assert!(state.process_line(r#"{"invalid": json"#).is_none());
        assert!(state.process_line(r#"{"class":"WATCH","enable":true}"#).is_none());
    }
}
