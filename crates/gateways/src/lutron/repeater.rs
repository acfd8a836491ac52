// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! TCP connection to the RadioRa2 repeater.
//!
//! Connecting runs a blocking telnet login exchange on the fresh socket,
//! then hands it to a LineSession, registers with the watchdog, and enables
//! monitor mode so the repeater pushes every state change at us. Received
//! lines are decoded against the monitoring grammar and recorded into the
//! cache.

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::RwLock;
use regex::Regex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use sg_net::{LineSession, Reconnect, ReconnectError, Watchdog};

use crate::error::GatewayError;
use crate::lutron::cache::{OutputCache, RefreshSink};

/// Repeater telnet port.
pub const DEFAULT_PORT: u16 = 23;

/// Prompt prefixes the repeater may glue onto a response line. The first
/// `GNET> ` after login carries a NUL; later ones keep the bare `\r` that
/// line splitting leaves behind.
const PROMPTS: &[&str] = &["GNET> \u{0}", "\rGNET> ", "GNET> "];

#[derive(Debug, Clone)]
pub struct RepeaterConfig {
    pub hostname: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

pub struct RaRepeater {
    config: RepeaterConfig,
    cache: Arc<OutputCache>,
    watchdog: Arc<Watchdog>,
    session: RwLock<Option<Arc<LineSession>>>,
    output_re: Regex,
    led_re: Regex,
    button_re: Regex,
}

impl RaRepeater {
    pub fn new(config: RepeaterConfig, watchdog: Arc<Watchdog>) -> Arc<Self> {
        Arc::new(Self {
            config,
            cache: OutputCache::new(),
            watchdog,
            session: RwLock::new(None),
            // The LED pattern must be tried before the button pattern,
            // which would also match an LED action line.
            output_re: literal_regex(r"^~OUTPUT,(\d+),1,(\d+\.\d+)"),
            led_re: literal_regex(r"^~DEVICE,(\d+),(\d+),9,([01])"),
            button_re: literal_regex(r"^~DEVICE,(\d+),(\d+),(\d+)"),
        })
    }

    pub fn cache(&self) -> &Arc<OutputCache> {
        &self.cache
    }

    /// Open the repeater connection: login exchange, LineSession startup,
    /// watchdog registration, monitor-mode enable. The reconnect thunk
    /// re-runs this whole sequence.
    pub async fn connect(self: &Arc<Self>) -> Result<(), GatewayError> {
        let mut stream = LineSession::dial(&self.config.hostname, self.config.port).await?;
        login(&mut stream, &self.config.username, &self.config.password).await?;
        info!(hostname = %self.config.hostname, "repeater login accepted");

        let (session, mut lines, mut workers) = LineSession::start("lutron", stream, None);
        *self.session.write() = Some(Arc::clone(&session));

        let dispatch = {
            let repeater = Arc::clone(self);
            tokio::spawn(async move {
                while let Some(line) = lines.recv().await {
                    repeater.handle_line(&line).await;
                }
            })
        };
        workers.push(dispatch);

        let reconnect = Arc::new(RaReconnect {
            repeater: Arc::downgrade(self),
        });
        self.watchdog.add(session, workers, reconnect);

        self.enable_monitoring();
        Ok(())
    }

    /// Subscribe to all monitoring event categories.
    fn enable_monitoring(&self) {
        self.send_command("#MONITORING,255,1");
    }

    pub fn send_command(&self, command: &str) {
        match *self.session.read() {
            Some(ref session) => session.send(command),
            None => warn!(%command, "repeater command dropped, not connected"),
        }
    }

    /// Decode one received line and record what it reports.
    pub async fn handle_line(&self, line: &str) {
        // Prompts can arrive alone or glued to the front of a response;
        // strip as many as are present and handle what remains.
        let mut rest = line;
        loop {
            let mut stripped = false;
            for prompt in PROMPTS {
                if let Some(tail) = rest.strip_prefix(prompt) {
                    rest = tail;
                    stripped = true;
                }
            }
            if !stripped {
                break;
            }
        }
        if rest.is_empty() {
            return;
        }

        if let Some(caps) = self.output_re.captures(rest) {
            let (Some(iid), Some(level)) = (parse_u32(&caps, 1), parse_f64(&caps, 2)) else {
                warn!(line = %rest, "malformed output response");
                return;
            };
            debug!(iid, level, "output level");
            self.cache.record_output(iid, level).await;
        } else if let Some(caps) = self.led_re.captures(rest) {
            let (Some(iid), Some(cid), Some(param)) = (
                parse_u32(&caps, 1),
                parse_u32(&caps, 2),
                parse_u32(&caps, 3),
            ) else {
                warn!(line = %rest, "malformed led response");
                return;
            };
            debug!(iid, cid, param, "led state");
            self.cache.record_led(iid, cid, param == 1).await;
        } else if let Some(caps) = self.button_re.captures(rest) {
            let (Some(iid), Some(cid), Some(action)) = (
                parse_u32(&caps, 1),
                parse_u32(&caps, 2),
                parse_u32(&caps, 3),
            ) else {
                warn!(line = %rest, "malformed button response");
                return;
            };
            match action {
                3 => self.cache.record_button(iid, cid, true).await,
                4 => self.cache.record_button(iid, cid, false).await,
                other => debug!(iid, cid, action = other, "unhandled device action"),
            }
        } else if rest.starts_with("~MONITORING") {
            debug!(line = %rest, "monitoring acknowledged");
        } else {
            warn!(line = %rest, "unmatched repeater reply");
        }
    }

    // -- cached state --------------------------------------------------------

    pub async fn get_output_level(&self, iid: u32) -> f64 {
        self.cache.get_output_level(iid).await
    }

    pub async fn get_button_state(&self, iid: u32, cid: u32) -> bool {
        self.cache.get_button_state(iid, cid).await
    }

    pub async fn get_led_state(&self, iid: u32, cid: u32) -> bool {
        self.cache.get_led_state(iid, cid).await
    }

    // -- commands ------------------------------------------------------------

    pub fn set_output_level(&self, iid: u32, level: f64) {
        self.send_command(&format!("#OUTPUT,{iid},1,{level}"));
    }

    pub fn pulse_output(&self, iid: u32) {
        self.send_command(&format!("#OUTPUT,{iid},6"));
    }

    pub fn set_button_state(&self, iid: u32, cid: u32, pressed: bool) {
        let action = if pressed { 3 } else { 4 };
        self.send_command(&format!("#DEVICE,{iid},{cid},{action}"));
    }

    pub fn set_led_state(&self, iid: u32, lid: u32, on: bool) {
        let state = u32::from(on);
        self.send_command(&format!("#DEVICE,{iid},{lid},9,{state}"));
    }
}

impl RefreshSink for RaRepeater {
    fn send_refresh(&self, command: String) {
        self.send_command(&command);
    }
}

struct RaReconnect {
    repeater: Weak<RaRepeater>,
}

#[async_trait]
impl Reconnect for RaReconnect {
    async fn reconnect(&self) -> Result<(), ReconnectError> {
        let Some(repeater) = self.repeater.upgrade() else {
            return Ok(()); // gateway gone; nothing to reconnect
        };
        repeater.connect().await?;
        // Monitoring is back on; re-pull everything we cache.
        repeater.cache.refresh_all().await;
        Ok(())
    }
}

#[allow(clippy::unwrap_used)] // compile-time literal patterns
fn literal_regex(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap()
}

fn parse_u32(caps: &regex::Captures<'_>, group: usize) -> Option<u32> {
    caps.get(group)?.as_str().parse().ok()
}

fn parse_f64(caps: &regex::Captures<'_>, group: usize) -> Option<f64> {
    caps.get(group)?.as_str().parse().ok()
}

/// Blocking login exchange on a freshly-opened repeater socket.
async fn login(
    stream: &mut TcpStream,
    username: &str,
    password: &str,
) -> Result<(), GatewayError> {
    expect_prompt(stream, "login: ").await?;
    stream.write_all(format!("{username}\r\n").as_bytes()).await?;
    expect_prompt(stream, "password: ").await?;
    stream.write_all(format!("{password}\r\n").as_bytes()).await?;
    expect_ready(stream).await
}

/// Read until the expected prompt appears.
async fn expect_prompt(stream: &mut TcpStream, prompt: &str) -> Result<(), GatewayError> {
    let buffer = read_until(stream, |buf| buf.contains(prompt)).await?;
    debug!(%prompt, received = %buffer, "login prompt");
    Ok(())
}

/// Read until the `GNET> ` ready prompt confirms the login. A repeated
/// `login: ` prompt means the credentials were rejected.
async fn expect_ready(stream: &mut TcpStream) -> Result<(), GatewayError> {
    let buffer = read_until(stream, |buf| {
        buf.contains("GNET> ") || buf.contains("login: ") || buf.contains("bad login")
    })
    .await?;
    if buffer.contains("GNET> ") {
        Ok(())
    } else {
        Err(GatewayError::Auth(format!(
            "repeater rejected login: {}",
            buffer.trim()
        )))
    }
}

const LOGIN_BUFFER_LIMIT: usize = 4096;

async fn read_until(
    stream: &mut TcpStream,
    done: impl Fn(&str) -> bool,
) -> Result<String, GatewayError> {
    let mut buffer = String::new();
    let mut chunk = [0u8; 256];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(GatewayError::Auth(format!(
                "connection closed during login (got {:?})",
                buffer
            )));
        }
        buffer.push_str(&String::from_utf8_lossy(&chunk[..n]));
        if done(&buffer) {
            return Ok(buffer);
        }
        if buffer.len() > LOGIN_BUFFER_LIMIT {
            return Err(GatewayError::Auth(
                "login prompt not recognized".to_string(),
            ));
        }
    }
}

#[cfg(test)]
#[path = "repeater_tests.rs"]
mod tests;
