//! WebSocket client feeding the engine inbox.
//!
//! Runs on its own thread. Every text or binary frame is pushed raw; decoding
//! happens on the tick thread. Connection changes are reported as status
//! items. Lost connections are retried with exponential backoff until the
//! link is closed.

use levitate_core::{ConnectionStatus, InboxSender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tungstenite::stream::MaybeTlsStream;
use tungstenite::Message;

// Socket read timeout, also the granularity at which `close` is noticed.
const READ_TIMEOUT: Duration = Duration::from_millis(200);
const BACKOFF_MIN: Duration = Duration::from_millis(500);
const BACKOFF_MAX: Duration = Duration::from_secs(8);

/// Owner side of a running link thread.
pub struct LinkHandle {
    closed: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl LinkHandle {
    /// Flag shared with the thread; setting it stops reconnecting.
    pub fn closer(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.closed)
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn join(mut self) {
        self.close();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("link thread panicked");
            }
        }
    }
}

pub fn spawn_ws_link(url: String, tx: InboxSender) -> anyhow::Result<LinkHandle> {
    let closed = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&closed);
    let thread = thread::Builder::new()
        .name("ws-link".into())
        .spawn(move || run_link(&url, &tx, &flag))?;
    Ok(LinkHandle {
        closed,
        thread: Some(thread),
    })
}

fn run_link(url: &str, tx: &InboxSender, closed: &AtomicBool) {
    let mut backoff = BACKOFF_MIN;
    let mut reported_down = false;
    while !closed.load(Ordering::SeqCst) {
        match tungstenite::connect(url) {
            Ok((mut socket, _response)) => {
                log::info!("connected to {url}");
                backoff = BACKOFF_MIN;
                reported_down = false;
                if !tx.push_status(ConnectionStatus::Connected) {
                    return;
                }
                if let MaybeTlsStream::Plain(stream) = socket.get_mut() {
                    if let Err(e) = stream.set_read_timeout(Some(READ_TIMEOUT)) {
                        log::warn!("could not set read timeout: {e}");
                    }
                }

                let reason = loop {
                    if closed.load(Ordering::SeqCst) {
                        let _ = socket.close(None);
                        let _ = socket.flush();
                        break "closed".to_string();
                    }
                    match socket.read() {
                        Ok(Message::Text(text)) => {
                            if !tx.push_frame(text.into_bytes()) {
                                return;
                            }
                        }
                        Ok(Message::Binary(bytes)) => {
                            if !tx.push_frame(bytes) {
                                return;
                            }
                        }
                        Ok(Message::Close(_)) => break "closed by peer".to_string(),
                        Ok(_) => {}
                        Err(tungstenite::Error::Io(e))
                            if matches!(
                                e.kind(),
                                std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                            ) => {}
                        Err(e) => break e.to_string(),
                    }
                };
                log::warn!("disconnected from {url}: {reason}");
                if !tx.push_status(ConnectionStatus::Disconnected(reason)) {
                    return;
                }
                reported_down = true;
            }
            Err(e) => {
                if !reported_down {
                    log::warn!("cannot reach {url}: {e}");
                    if !tx.push_status(ConnectionStatus::Disconnected(e.to_string())) {
                        return;
                    }
                    reported_down = true;
                } else {
                    log::debug!("retrying {url} in {:?}: {e}", backoff);
                }
            }
        }
        sleep_unless_closed(backoff, closed);
        backoff = (backoff * 2).min(BACKOFF_MAX);
    }
    log::info!("link to {url} stopped");
}

fn sleep_unless_closed(total: Duration, closed: &AtomicBool) {
    let step = Duration::from_millis(50);
    let mut slept = Duration::ZERO;
    while slept < total && !closed.load(Ordering::SeqCst) {
        thread::sleep(step);
        slept += step;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use levitate_core::{inbox, Drained};

    #[test]
    fn unreachable_server_reports_disconnected_once_then_stops_on_close() {
        let (tx, rx) = inbox();
        // Port 9 (discard) on loopback is expected to refuse connections.
        let link = spawn_ws_link("ws://127.0.0.1:9".into(), tx).unwrap();
        thread::sleep(Duration::from_millis(300));
        link.join();

        let mut drained = Vec::new();
        rx.drain_into(&mut drained);
        let downs = drained
            .iter()
            .filter(|d| matches!(d, Drained::Status(ConnectionStatus::Disconnected(_))))
            .count();
        assert_eq!(downs, 1);
    }
}
