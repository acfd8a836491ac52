// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reflector: chains additional clients through our single panel
//! connection (the Envisalink allows only one at a time), mimicking the
//! panel's own client protocol.
//!
//! New clients get the authentication-required banner and must answer with
//! a `005` login. The password comparison deliberately skips checksum
//! verification, matching the emulated interface: a child's login frame
//! reaches this path without going through the panel decoder at all.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::net::TcpListener;
use tracing::{info, warn};

use sg_net::LineSession;

use crate::dsc::panel::DscPanelServer;
use crate::error::GatewayError;

const BANNER_AUTH_REQUIRED: &str = "5053CD";
const AUTH_SUCCESS: &str = "5051CB";
const AUTH_FAILURE: &str = "5050CA";

struct Child {
    id: u64,
    session: Arc<LineSession>,
    authenticated: Arc<AtomicBool>,
}

pub struct Reflector {
    port: u16,
    password: String,
    panel: Weak<DscPanelServer>,
    next_child_id: AtomicU64,
    children: Mutex<Vec<Child>>,
}

impl Reflector {
    /// Bind the listening socket and start accepting chained clients.
    pub async fn start(
        panel: &Arc<DscPanelServer>,
        port: u16,
        password: String,
    ) -> Result<Arc<Self>, GatewayError> {
        let listener = TcpListener::bind(("0.0.0.0", port)).await?;
        let bound_port = listener.local_addr()?.port();
        let reflector = Arc::new(Self {
            port: bound_port,
            password,
            panel: Arc::downgrade(panel),
            next_child_id: AtomicU64::new(1),
            children: Mutex::new(Vec::new()),
        });

        let accept = Arc::clone(&reflector);
        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        info!(%addr, "reflector accepted chained connection");
                        accept.adopt(stream);
                    }
                    Err(e) => {
                        warn!(error = %e, "reflector accept failed");
                        break;
                    }
                }
            }
        });
        Ok(reflector)
    }

    /// The actually-bound port (useful when configured as 0).
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn authenticated_children(&self) -> usize {
        self.children
            .lock()
            .iter()
            .filter(|c| c.authenticated.load(Ordering::SeqCst))
            .count()
    }

    fn adopt(self: &Arc<Self>, stream: tokio::net::TcpStream) {
        let (session, mut lines, _workers) =
            LineSession::start("dsc-reflector-child", stream, None);
        session.send(BANNER_AUTH_REQUIRED);

        let id = self.next_child_id.fetch_add(1, Ordering::Relaxed);
        let authenticated = Arc::new(AtomicBool::new(false));
        self.children.lock().push(Child {
            id,
            session: Arc::clone(&session),
            authenticated: Arc::clone(&authenticated),
        });

        let reflector = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(line) = lines.recv().await {
                reflector.handle_child_line(&session, &authenticated, &line);
            }
            // Socket closed; drop the child under the send lock.
            reflector.children.lock().retain(|c| c.id != id);
            info!(child = id, "reflector child disconnected");
        });
    }

    fn handle_child_line(
        &self,
        session: &Arc<LineSession>,
        authenticated: &Arc<AtomicBool>,
        line: &str,
    ) {
        if line.starts_with("005") {
            if authenticated.load(Ordering::SeqCst) {
                // Never let a child mess with the parent's authentication
                // state.
                warn!("reflector child attempted re-authentication");
                return;
            }
            // Compare the password field directly; checksum unchecked.
            let supplied = if line.len() >= 5 {
                &line[3..line.len() - 2]
            } else {
                ""
            };
            if supplied == self.password {
                authenticated.store(true, Ordering::SeqCst);
                info!("reflector child authenticated");
                session.send(AUTH_SUCCESS);
            } else {
                warn!("reflector child failed authentication");
                session.send(AUTH_FAILURE);
            }
            return;
        }

        if authenticated.load(Ordering::SeqCst) {
            match self.panel.upgrade() {
                Some(panel) => panel.send_frame(line),
                None => warn!("reflector has no panel to forward to"),
            }
        } else {
            warn!(
                command = &line[..line.len().min(3)],
                "reflector child attempted command in unauthenticated state"
            );
        }
    }

    /// Forward a panel frame to every authenticated child, pruning closed
    /// sessions on the way.
    pub fn to_children(&self, frame: &str) {
        let mut children = self.children.lock();
        children.retain(|c| !c.session.is_closed());
        for child in children.iter() {
            if child.authenticated.load(Ordering::SeqCst) {
                child.session.send(frame);
            }
        }
    }
}

#[cfg(test)]
#[path = "reflector_tests.rs"]
mod tests;
