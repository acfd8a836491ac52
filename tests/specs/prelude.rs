// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures: fake repeater and panel endpoints, and a house builder.

use std::collections::HashMap;
use std::io::Write as _;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use sg_core::FakeClock;
use sg_house::{FakeNotifyAdapter, House, Notifier};
use sg_storage::Persistence;

pub const TICK: std::time::Duration = std::time::Duration::from_secs(10);

pub fn build_house() -> (Arc<House>, FakeClock, FakeNotifyAdapter) {
    let clock = FakeClock::new();
    let persist =
        Arc::new(Persistence::open_in_memory(Arc::new(clock.clone())).expect("in-memory db"));
    let adapter = FakeNotifyAdapter::new();
    let mut aliases = HashMap::new();
    aliases.insert(
        "admin".to_string(),
        vec![("email".to_string(), "admin@example.com".to_string())],
    );
    let notifier = Notifier::new(aliases, Arc::new(adapter.clone()));
    let house =
        House::new("House", persist, notifier, Arc::new(clock.clone())).expect("house init");
    (house, clock, adapter)
}

pub async fn settle() {
    tokio::time::sleep(std::time::Duration::from_millis(300)).await;
}

/// Poll until the condition holds, failing the test after [`TICK`].
pub async fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + TICK;
    while !cond() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {what}"
        );
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }
}

// -- fake Lutron repeater -----------------------------------------------------

/// Loopback repeater accepting any number of sequential connections. Each
/// connection runs the login dialog, answers refresh queries from a shared
/// level table, records the commands it receives, and echoes level sets as
/// monitoring events (as the real repeater does in monitor mode).
pub struct FakeRepeater {
    pub port: u16,
    levels: Arc<Mutex<HashMap<u32, f64>>>,
    connections: Arc<Mutex<Vec<Arc<Mutex<Vec<String>>>>>>,
    current_push: Arc<Mutex<Option<mpsc::UnboundedSender<PushItem>>>>,
}

enum PushItem {
    Line(String),
    Close,
}

impl FakeRepeater {
    pub async fn start(initial_levels: HashMap<u32, f64>) -> Arc<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let fake = Arc::new(Self {
            port,
            levels: Arc::new(Mutex::new(initial_levels)),
            connections: Arc::new(Mutex::new(Vec::new())),
            current_push: Arc::new(Mutex::new(None)),
        });

        let state = Arc::clone(&fake);
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let log = Arc::new(Mutex::new(Vec::new()));
                state.connections.lock().push(Arc::clone(&log));
                let (push_tx, push_rx) = mpsc::unbounded_channel();
                *state.current_push.lock() = Some(push_tx);
                // Connections are sequential: serve this one to completion
                // before accepting the next (matches the real repeater).
                state.serve(stream, log, push_rx).await;
            }
        });
        fake
    }

    async fn serve(
        &self,
        stream: tokio::net::TcpStream,
        log: Arc<Mutex<Vec<String>>>,
        mut push_rx: mpsc::UnboundedReceiver<PushItem>,
    ) {
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);
        let mut line = String::new();

        let login_ok = async {
            write_half.write_all(b"login: ").await.ok()?;
            line.clear();
            reader.read_line(&mut line).await.ok()?;
            write_half.write_all(b"password: ").await.ok()?;
            line.clear();
            reader.read_line(&mut line).await.ok()?;
            write_half.write_all(b"\r\nGNET> ").await.ok()?;
            Some(())
        }
        .await;
        if login_ok.is_none() {
            return;
        }

        loop {
            line.clear();
            tokio::select! {
                pushed = push_rx.recv() => {
                    match pushed {
                        Some(PushItem::Line(pushed)) => {
                            let frame = format!("{pushed}\r\n");
                            if write_half.write_all(frame.as_bytes()).await.is_err() {
                                break;
                            }
                        }
                        Some(PushItem::Close) | None => break,
                    }
                }
                read = reader.read_line(&mut line) => {
                    match read {
                        Ok(0) | Err(_) => break,
                        Ok(_) => {}
                    }
                    let command = line.trim_end().to_string();
                    let reply = self.respond(&command);
                    log.lock().push(command);
                    if let Some(reply) = reply {
                        let frame = format!("\rGNET> {reply}\r\n");
                        if write_half.write_all(frame.as_bytes()).await.is_err() {
                            break;
                        }
                    }
                }
            }
        }
    }

    fn respond(&self, command: &str) -> Option<String> {
        if let Some(rest) = command.strip_prefix("?OUTPUT,") {
            let iid: u32 = rest.strip_suffix(",1")?.parse().ok()?;
            let level = self.levels.lock().get(&iid).copied().unwrap_or(0.0);
            return Some(format!("~OUTPUT,{iid},1,{level:.2}"));
        }
        if let Some(rest) = command.strip_prefix("?DEVICE,") {
            let mut parts = rest.split(',');
            let iid: u32 = parts.next()?.parse().ok()?;
            let cid: u32 = parts.next()?.parse().ok()?;
            return Some(format!("~DEVICE,{iid},{cid},9,0"));
        }
        if let Some(rest) = command.strip_prefix("#OUTPUT,") {
            let mut parts = rest.split(',');
            let iid: u32 = parts.next()?.parse().ok()?;
            if parts.next() == Some("1") {
                let level: f64 = parts.next()?.parse().ok()?;
                self.levels.lock().insert(iid, level);
                return Some(format!("~OUTPUT,{iid},1,{level:.2}"));
            }
        }
        None
    }

    /// Inject a monitoring line on the current connection.
    pub fn push(&self, event: &str) {
        if let Some(tx) = self.current_push.lock().as_ref() {
            let _ = tx.send(PushItem::Line(event.to_string()));
        }
    }

    /// Drop the current connection (simulates a repeater reboot).
    pub fn close_current(&self) {
        if let Some(tx) = self.current_push.lock().as_ref() {
            let _ = tx.send(PushItem::Close);
        }
    }

    /// Commands received, one list per accepted connection.
    pub fn connections(&self) -> Vec<Vec<String>> {
        self.connections
            .lock()
            .iter()
            .map(|log| log.lock().clone())
            .collect()
    }

    pub fn commands(&self) -> Vec<String> {
        self.connections().into_iter().flatten().collect()
    }
}

/// Minimal Lutron layout: one dimmed output iid=5 in the kitchen, plus the
/// bridge test's output iid=10.
pub const LAYOUT_XML: &str = r#"<?xml version="1.0"?>
<Project>
  <Areas>
    <Area Name="Root Area" IntegrationID="1">
      <Areas>
        <Area Name="Kitchen" IntegrationID="4">
          <Outputs>
            <Output Name="Kitchen Light" IntegrationID="5" OutputType="INC" />
            <Output Name="Bridged Light" IntegrationID="10" OutputType="NON_DIM" />
          </Outputs>
        </Area>
      </Areas>
    </Area>
  </Areas>
</Project>
"#;

pub fn radiora2_section(port: u16, xml: &str) -> (sg_config::GatewayConfig, tempfile::NamedTempFile) {
    let mut xml_file = tempfile::NamedTempFile::new().unwrap();
    xml_file.write_all(xml.as_bytes()).unwrap();
    let config: sg_config::GatewayConfig = serde_yaml::from_str(&format!(
        "repeater:\n  hostname: 127.0.0.1\n  port: {}\n  username: u\n  password: p\n  cached_database: {}\n",
        port,
        xml_file.path().display()
    ))
    .unwrap();
    (config, xml_file)
}

// -- fake DSC panel -----------------------------------------------------------

/// Loopback panel endpoint: logs every frame it receives, lets tests push
/// frames back, and optionally answers the global-status request with a
/// canned burst.
pub struct FakePanel {
    pub port: u16,
    received: Arc<Mutex<Vec<String>>>,
    push: Arc<Mutex<Option<mpsc::UnboundedSender<String>>>>,
    status_burst: Arc<Mutex<Vec<String>>>,
}

impl FakePanel {
    pub async fn start(status_burst: Vec<String>) -> Arc<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let fake = Arc::new(Self {
            port,
            received: Arc::new(Mutex::new(Vec::new())),
            push: Arc::new(Mutex::new(None)),
            status_burst: Arc::new(Mutex::new(status_burst)),
        });

        let state = Arc::clone(&fake);
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let (push_tx, mut push_rx) = mpsc::unbounded_channel::<String>();
                *state.push.lock() = Some(push_tx);

                let (read_half, mut write_half) = stream.into_split();
                let mut reader = BufReader::new(read_half);
                let mut line = String::new();
                loop {
                    line.clear();
                    tokio::select! {
                        pushed = push_rx.recv() => {
                            let Some(pushed) = pushed else { break };
                            let frame = format!("{pushed}\r\n");
                            if write_half.write_all(frame.as_bytes()).await.is_err() {
                                break;
                            }
                        }
                        read = reader.read_line(&mut line) => {
                            match read {
                                Ok(0) | Err(_) => break,
                                Ok(_) => {}
                            }
                            let frame = line.trim_end().to_string();
                            let is_status_request = frame.starts_with("001");
                            let is_login = frame.starts_with("005");
                            state.received.lock().push(frame);
                            if is_login {
                                let _ = write_half
                                    .write_all(b"5051CB\r\n")
                                    .await;
                            }
                            if is_status_request {
                                let burst = state.status_burst.lock().clone();
                                for event in burst {
                                    let frame = format!("{event}\r\n");
                                    if write_half.write_all(frame.as_bytes()).await.is_err() {
                                        break;
                                    }
                                }
                            }
                        }
                    }
                }
            }
        });
        fake
    }

    pub fn push(&self, frame: &str) {
        if let Some(tx) = self.push.lock().as_ref() {
            let _ = tx.send(frame.to_string());
        }
    }

    pub fn received(&self) -> Vec<String> {
        self.received.lock().clone()
    }
}

pub fn powerseries_section(port: u16) -> sg_config::GatewayConfig {
    serde_yaml::from_str(&format!(
        "gateway:\n  hostname: 127.0.0.1\n  port: {port}\n  password: \"1234\"\nzones:\n  3: Front Door\n  7:\n    type: closure\n    name: Bridged Switch\npartition_names:\n  1: Main\narea_mapping:\n  Kitchen: [3, 7]\n"
    ))
    .unwrap()
}
