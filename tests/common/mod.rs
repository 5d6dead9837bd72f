// tests/common/mod.rs
//! In-process gpsd stand-in

#![allow(dead_code)]

use std::time::Duration;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
    sync::oneshot,
    task::JoinHandle,
};

pub const TIMEOUT: Duration = Duration::from_secs(5);

pub const VERSION_MSG: &str =
    r#"{"class":"VERSION","release":"3.25","rev":"3.25","proto_major":3,"proto_minor":15}"#;

pub const SKY_MSG: &str = r#"{"class":"SKY","device":"/dev/ttyACM0","hdop":0.9,"uSat":9,"nSat":14,"satellites":[]}"#;

pub fn tpv(lat: f64, lon: f64) -> String {
    format!(
        r#"{{"class":"TPV","device":"/dev/ttyACM0","mode":3,"time":"2024-05-01T12:00:00.000Z","lat":{},"lon":{},"alt":12.0,"track":87.0,"speed":1.2}}"#,
        lat, lon
    )
}

pub fn tpv_without_mode() -> String {
    r#"{"class":"TPV","device":"/dev/ttyACM0","time":"2024-05-01T12:00:00.000Z","lat":1.0,"lon":1.0}"#
        .to_string()
}

/// One step of what the fake gpsd sends
pub enum Step {
    /// Raw bytes, written as-is with a newline appended
    Line(Vec<u8>),
    Pause(Duration),
}

impl From<String> for Step {
    fn from(line: String) -> Self {
        Step::Line(line.into_bytes())
    }
}

pub struct FakeGpsd {
    pub port: u16,
    /// Everything the client sent, collected once it closes the connection
    pub received: JoinHandle<String>,
}

/// Serve `lines` to the first client.
///
/// When `release` is given, lines are only written after it fires. With
/// `hang_up` the write half is shut down afterwards so the client sees EOF.
pub async fn serve(
    lines: Vec<String>,
    release: Option<oneshot::Receiver<()>>,
    hang_up: bool,
) -> FakeGpsd {
    serve_steps(lines.into_iter().map(Step::from).collect(), release, hang_up).await
}

pub async fn serve_steps(
    steps: Vec<Step>,
    release: Option<oneshot::Receiver<()>>,
    hang_up: bool,
) -> FakeGpsd {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind fake gpsd");
    let port = listener.local_addr().unwrap().port();

    let received = tokio::spawn(async move {
        let (mut client, _) = listener.accept().await.expect("No client connected");
        if let Some(release) = release {
            let _ = release.await;
        }
        for step in steps {
            match step {
                Step::Line(mut line) => {
                    line.push(b'\n');
                    if client.write_all(&line).await.is_err() {
                        break;
                    }
                }
                Step::Pause(delay) => tokio::time::sleep(delay).await,
            }
        }
        if hang_up {
            let _ = client.shutdown().await;
        }

        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            match client.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => buf.extend_from_slice(&chunk[..n]),
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    });

    FakeGpsd { port, received }
}

pub fn unused_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}
