// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::session::LineSession;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;

async fn live_session() -> (Arc<LineSession>, Vec<JoinHandle<()>>, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let client = TcpStream::connect(addr).await.unwrap();
    let (server, _) = listener.accept().await.unwrap();
    let (session, _lines, workers) = LineSession::start("wd-test", client, None);
    (session, workers, server)
}

struct CountingReconnect {
    calls: AtomicUsize,
    fail_first: usize,
    done: Notify,
}

impl CountingReconnect {
    fn new(fail_first: usize) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail_first,
            done: Notify::new(),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(AtomicOrdering::SeqCst)
    }
}

#[async_trait]
impl Reconnect for CountingReconnect {
    async fn reconnect(&self) -> Result<(), ReconnectError> {
        let n = self.calls.fetch_add(1, AtomicOrdering::SeqCst) + 1;
        if n <= self.fail_first {
            return Err("still down".into());
        }
        self.done.notify_one();
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn socket_close_triggers_teardown_and_reconnect() {
    let (session, workers, server) = live_session().await;
    let watchdog = Watchdog::new();
    let reconnect = CountingReconnect::new(0);
    watchdog.add(Arc::clone(&session), workers, reconnect.clone());
    assert_eq!(watchdog.active_count(), 1);

    let start = tokio::time::Instant::now();
    drop(server);

    reconnect.done.notified().await;
    assert_eq!(reconnect.calls(), 1);
    assert!(
        start.elapsed() >= Duration::from_secs(2),
        "first attempt waits the initial backoff"
    );
    assert_eq!(watchdog.active_count(), 0);
    assert!(session.is_closed());
}

#[tokio::test(start_paused = true)]
async fn failed_reconnect_retries_with_growing_backoff() {
    let (session, workers, server) = live_session().await;
    let watchdog = Watchdog::new();
    let reconnect = CountingReconnect::new(2);
    watchdog.add(session, workers, reconnect.clone());

    let start = tokio::time::Instant::now();
    drop(server);

    reconnect.done.notified().await;
    assert_eq!(reconnect.calls(), 3);
    // Delays 2 + 4 + 8 seconds before the third (successful) attempt.
    assert!(start.elapsed() >= Duration::from_secs(14));
}

#[tokio::test(start_paused = true)]
async fn explicit_close_also_trips_the_watchdog() {
    let (session, workers, _server) = live_session().await;
    let watchdog = Watchdog::new();
    let reconnect = CountingReconnect::new(0);
    watchdog.add(Arc::clone(&session), workers, reconnect.clone());

    session.close();
    reconnect.done.notified().await;
    assert_eq!(reconnect.calls(), 1);
}
